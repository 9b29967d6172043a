#[macro_use]
extern crate diesel;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod feed;
pub mod profile;
pub mod tweet;
pub mod types;
pub mod users;
mod utils;

use rocket::request::Request;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Rocket};

use crate::config::Config;

#[catch(400)]
fn bad_request(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "body": ["malformed request"]
        }
    }))
}

#[catch(401)]
fn unauthorized(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "status": "401 Unauthorized"
        }
    }))
}

#[catch(404)]
fn not_found(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "entity": ["not found"]
        }
    }))
}

#[catch(422)]
fn unprocessable(_req: &Request) -> Json<Value> {
    Json(json!({
        "errors": {
            "body": ["unprocessable entity"]
        }
    }))
}

/// Builds the application: opens the pool, runs pending migrations and
/// mounts every route under `/api`.
pub fn rocket(config: Config) -> db::Result<Rocket<Build>> {
    let pool = db::init_pool(&config)?;
    Ok(rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/api",
            routes![
                users::register_user,
                users::login,
                users::current,
                users::delete_account,
            ],
        )
        .mount(
            "/api",
            routes![
                profile::follow_user,
                profile::unfollow_user,
                profile::followers,
                profile::following,
            ],
        )
        .mount(
            "/api",
            routes![
                tweet::create,
                tweet::show,
                tweet::favorite_tweet,
                tweet::unfavorite_tweet,
            ],
        )
        .mount(
            "/api",
            routes![
                feed::trending_tweets,
                feed::timeline_tweets,
                feed::favorite_tweets,
                feed::search_tweets,
                feed::user_page,
            ],
        )
        .register("/", catchers![bad_request, unauthorized, not_found, unprocessable]))
}
