use microblog::config::Config;
use rocket::http::{ContentType, Header, Status};
use rocket::local::blocking::{Client, LocalResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    client: Client,
    _dir: TempDir,
}

fn app() -> TestApp {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("microblog.db");
    let config = Config::with_database_url(path.to_str().expect("utf-8 path"));
    let rocket = microblog::rocket(config).expect("build app");
    let client = Client::tracked(rocket).expect("valid rocket instance");
    TestApp { client, _dir: dir }
}

struct Account {
    id: i64,
    token: String,
}

impl Account {
    fn auth(&self) -> Header<'static> {
        Header::new("Authorization", format!("Token {}", self.token))
    }
}

fn register(client: &Client, name: &str) -> Account {
    let response = client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(
            json!({
                "user": {
                    "name": name,
                    "mailaddress": format!("{}@test.com", name),
                    "password": "password123"
                }
            })
            .to_string(),
        )
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let body = body(response);
    Account {
        id: body["user"]["id"].as_i64().expect("user id"),
        token: body["user"]["token"].as_str().expect("token").to_string(),
    }
}

fn body(response: LocalResponse) -> Value {
    response.into_json::<Value>().expect("json body")
}

fn post_tweet<'c>(client: &'c Client, account: &Account, msg: &str) -> LocalResponse<'c> {
    client
        .post("/api/tweets")
        .header(ContentType::JSON)
        .header(account.auth())
        .body(json!({ "tweet": { "msg": msg } }).to_string())
        .dispatch()
}

fn tweet_id(client: &Client, account: &Account, msg: &str) -> i64 {
    let response = post_tweet(client, account, msg);
    assert_eq!(response.status(), Status::Ok);
    body(response)["tweet"]["id"].as_i64().expect("tweet id")
}

fn msgs(value: &Value) -> Vec<String> {
    value["tweets"]
        .as_array()
        .expect("tweets array")
        .iter()
        .map(|t| t["msg"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn register_login_and_fetch_current_user() {
    let app = app();
    let alice = register(&app.client, "alice");

    let response = app
        .client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(json!({ "user": { "mailaddress": "alice@test.com", "password": "password123" } }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::Ok);
    let login = body(response);
    assert_eq!(login["user"]["id"].as_i64(), Some(alice.id));
    assert!(login["user"].get("password_hash").is_none());

    let response = app.client.get("/api/user").header(alice.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["user"]["name"], "alice");
}

#[test]
fn bad_credentials_and_missing_tokens_are_refused() {
    let app = app();
    register(&app.client, "alice");

    let response = app
        .client
        .post("/api/users/login")
        .header(ContentType::JSON)
        .body(json!({ "user": { "mailaddress": "alice@test.com", "password": "wrong-one" } }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = app.client.get("/api/timeline").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);

    let response = app
        .client
        .get("/api/timeline")
        .header(Header::new("Authorization", "Token forged"))
        .dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn duplicate_registration_is_a_validation_error() {
    let app = app();
    register(&app.client, "alice");
    let response = app
        .client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(json!({ "user": { "name": "other", "mailaddress": "alice@test.com", "password": "password123" } }).to_string())
        .dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(body(response)["errors"]["mailaddress"].is_array());
}

#[test]
fn timeline_shows_followed_posts_newest_first() {
    let app = app();
    let a = register(&app.client, "alice");
    let b = register(&app.client, "bob");

    let response = app.client.post(format!("/api/follow/{}", b.id)).header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(body(response)["profile"]["following"], true);

    tweet_id(&app.client, &b, "hello");
    tweet_id(&app.client, &b, "world");

    let response = app.client.get("/api/timeline").header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);
    assert_eq!(msgs(&body(response)), vec!["world", "hello"]);

    let response = app.client.get(format!("/api/users/{}", b.id)).header(a.auth()).dispatch();
    let page = body(response);
    assert_eq!(page["profile"]["following"], true);
    assert_eq!(msgs(&page), vec!["world", "hello"]);

    let response = app.client.get("/api/followers").header(b.auth()).dispatch();
    let followers = body(response);
    assert_eq!(followers["users"][0]["id"].as_i64(), Some(a.id));
    assert_eq!(followers["users"][0]["following"], false);

    app.client.post(format!("/api/unfollow/{}", b.id)).header(a.auth()).dispatch();
    let response = app.client.get("/api/timeline").header(a.auth()).dispatch();
    assert!(msgs(&body(response)).is_empty());
}

#[test]
fn following_yourself_is_rejected() {
    let app = app();
    let a = register(&app.client, "alice");
    let response = app.client.post(format!("/api/follow/{}", a.id)).header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = app.client.get("/api/following").header(a.auth()).dispatch();
    assert_eq!(body(response)["users"], json!([]));
}

#[test]
fn two_favorites_make_a_tweet_trend() {
    let app = app();
    let a = register(&app.client, "alice");
    let b = register(&app.client, "bob");
    let c = register(&app.client, "carol");
    let post = tweet_id(&app.client, &a, "worth a look");

    app.client.post(format!("/api/favorite/{}", post)).header(b.auth()).dispatch();
    let response = app.client.get("/api/trending").dispatch();
    assert!(msgs(&body(response)).is_empty());

    let response = app.client.post(format!("/api/favorite/{}", post)).header(c.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);
    let favorited = body(response);
    assert_eq!(favorited["tweet"]["favorite_count"], 2);
    assert_eq!(favorited["tweet"]["favorited"], true);

    // Unfavoriting something never favorited is a no-op.
    let response = app.client.post(format!("/api/unfavorite/{}", post)).header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = app.client.get("/api/trending").dispatch();
    let trending = body(response);
    assert_eq!(msgs(&trending), vec!["worth a look"]);
    assert_eq!(trending["tweets"][0]["favorite_count"], 2);

    let response = app.client.get("/api/favorites").header(c.auth()).dispatch();
    assert_eq!(msgs(&body(response)), vec!["worth a look"]);
}

#[test]
fn tweet_length_and_unknown_ids() {
    let app = app();
    let a = register(&app.client, "alice");

    let response = post_tweet(&app.client, &a, &"x".repeat(129));
    assert_eq!(response.status(), Status::UnprocessableEntity);
    assert!(body(response)["errors"]["msg"].is_array());

    let response = post_tweet(&app.client, &a, "");
    assert_eq!(response.status(), Status::UnprocessableEntity);

    let response = app.client.post("/api/favorite/4242").header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = app.client.post("/api/follow/4242").header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::NotFound);

    let response = app.client.get("/api/tweets/4242").dispatch();
    assert_eq!(response.status(), Status::NotFound);
}

#[test]
fn search_by_substring() {
    let app = app();
    let a = register(&app.client, "alice");
    tweet_id(&app.client, &a, "good food");
    tweet_id(&app.client, &a, "bad weather");
    tweet_id(&app.client, &a, "more food");

    let response = app.client.get("/api/search?q=food").header(a.auth()).dispatch();
    assert_eq!(msgs(&body(response)), vec!["more food", "good food"]);

    let response = app.client.get("/api/search?q=").header(a.auth()).dispatch();
    assert!(msgs(&body(response)).is_empty());

    let response = app.client.get("/api/search").header(a.auth()).dispatch();
    assert!(msgs(&body(response)).is_empty());
}

#[test]
fn deleting_an_account_removes_its_tweets() {
    let app = app();
    let a = register(&app.client, "alice");
    let b = register(&app.client, "bob");
    let post = tweet_id(&app.client, &b, "short lived");
    app.client.post(format!("/api/follow/{}", b.id)).header(a.auth()).dispatch();

    let response = app.client.delete("/api/user").header(b.auth()).dispatch();
    assert_eq!(response.status(), Status::Ok);

    let response = app.client.get(format!("/api/tweets/{}", post)).dispatch();
    assert_eq!(response.status(), Status::NotFound);
    let response = app.client.get(format!("/api/users/{}", b.id)).header(a.auth()).dispatch();
    assert_eq!(response.status(), Status::NotFound);
    let response = app.client.get("/api/following").header(a.auth()).dispatch();
    assert_eq!(body(response)["users"], json!([]));
}
