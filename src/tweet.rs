use chrono::{NaiveDateTime, Utc};
use diesel::dsl::{count_star, exists};
use diesel::prelude::*;
use diesel::{insert_into, select};
use log::{debug, info};
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::db::schema::{favorites, tweets, users};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::{CurrentUser, Identity, User};
use crate::utils::{char_len, serialize_date};

pub const MSG_MAX_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = tweets)]
pub struct Tweet {
    pub id: i32,
    pub user_id: i32,
    pub msg: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = tweets)]
struct NewTweet<'a> {
    user_id: i32,
    msg: &'a str,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = favorites)]
struct NewFavorite {
    user_id: i32,
    tweet_id: i32,
    created_at: NaiveDateTime,
}

pub fn validate_msg(msg: &str) -> Result<(), ValidationError> {
    let len = char_len(msg);
    if len == 0 || len > MSG_MAX_LEN {
        Err(ValidationError::from(
            "msg",
            format!("Tweet must be between 1 and {} characters", MSG_MAX_LEN),
        ))
    } else {
        Ok(())
    }
}

impl Tweet {
    pub fn create(author: i32, msg: &str, connection: &mut SqliteConnection) -> Result<Tweet, ApiError> {
        validate_msg(msg)?;
        connection.immediate_transaction(|conn| {
            if !User::exists(author, conn)? {
                return Err(ApiError::NotFound("user"));
            }
            let now = Utc::now().naive_utc();
            let tweet = insert_into(tweets::table)
                .values(&NewTweet {
                    user_id: author,
                    msg,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Tweet::as_returning())
                .get_result(conn)?;
            debug!("user {} posted tweet {}", author, tweet.id);
            Ok(tweet)
        })
    }

    pub fn load(tweet_id: i32, connection: &mut SqliteConnection) -> Result<Tweet, ApiError> {
        tweets::table
            .find(tweet_id)
            .select(Tweet::as_select())
            .first(connection)
            .optional()?
            .ok_or(ApiError::NotFound("tweet"))
    }

    pub fn exists(tweet_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
        let found = select(exists(tweets::table.find(tweet_id))).get_result::<bool>(connection)?;
        Ok(found)
    }

    /// Removes the tweet and every favorite that points at it.
    pub fn delete(tweet_id: i32, connection: &mut SqliteConnection) -> Result<(), ApiError> {
        let deleted = diesel::delete(tweets::table.find(tweet_id)).execute(connection)?;
        if deleted == 0 {
            return Err(ApiError::NotFound("tweet"));
        }
        info!("tweet {} deleted", tweet_id);
        Ok(())
    }

    pub fn favorite_count(tweet_id: i32, connection: &mut SqliteConnection) -> Result<i64, ApiError> {
        let count = favorites::table
            .filter(favorites::tweet_id.eq(tweet_id))
            .count()
            .get_result::<i64>(connection)?;
        Ok(count)
    }
}

/// Marks `tweet_id` as a favorite of `actor`. Returns `false` when the edge
/// already existed.
pub fn favorite(actor: i32, tweet_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    connection.immediate_transaction(|conn| {
        if !Tweet::exists(tweet_id, conn)? {
            return Err(ApiError::NotFound("tweet"));
        }
        if !User::exists(actor, conn)? {
            return Err(ApiError::NotFound("user"));
        }
        let inserted = insert_into(favorites::table)
            .values(&NewFavorite {
                user_id: actor,
                tweet_id,
                created_at: Utc::now().naive_utc(),
            })
            .on_conflict((favorites::user_id, favorites::tweet_id))
            .do_nothing()
            .execute(conn)?;
        if inserted > 0 {
            info!("user {} favorited tweet {}", actor, tweet_id);
        } else {
            debug!("user {} already favorited tweet {}", actor, tweet_id);
        }
        Ok(inserted > 0)
    })
}

/// Removes the favorite edge if present. Returns `false` when there was none.
pub fn unfavorite(actor: i32, tweet_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    connection.immediate_transaction(|conn| {
        if !Tweet::exists(tweet_id, conn)? {
            return Err(ApiError::NotFound("tweet"));
        }
        let deleted = diesel::delete(
            favorites::table
                .filter(favorites::user_id.eq(actor))
                .filter(favorites::tweet_id.eq(tweet_id)),
        ).execute(conn)?;
        if deleted > 0 {
            info!("user {} unfavorited tweet {}", actor, tweet_id);
        } else {
            debug!("user {} had not favorited tweet {}", actor, tweet_id);
        }
        Ok(deleted > 0)
    })
}

pub fn has_favorited(actor: i32, tweet_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    let found = select(exists(
        favorites::table
            .filter(favorites::user_id.eq(actor))
            .filter(favorites::tweet_id.eq(tweet_id)),
    )).get_result::<bool>(connection)?;
    Ok(found)
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Author {
    pub id: i32,
    pub name: String,
}

/// A tweet as rendered to clients: author, engagement and whether the viewer
/// has favorited it.
#[derive(Debug, Serialize)]
pub struct TweetView {
    pub id: i32,
    pub msg: String,
    pub author: Author,
    pub favorite_count: i64,
    pub favorited: bool,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
}

impl TweetView {
    /// Decorates `tweets` in their given order. Authors, counts and the
    /// viewer's favorites are fetched with one query each.
    pub fn load_many(
        tweets: Vec<Tweet>,
        viewer: Option<i32>,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<TweetView>, ApiError> {
        if tweets.is_empty() {
            return Ok(Vec::new());
        }
        let tweet_ids: Vec<i32> = tweets.iter().map(|t| t.id).collect();
        let author_ids: Vec<i32> = tweets.iter().map(|t| t.user_id).collect();

        let authors = users::table
            .filter(users::id.eq_any(&author_ids))
            .select((users::id, users::name))
            .load::<(i32, String)>(connection)?
            .into_iter()
            .collect::<HashMap<_, _>>();

        let counts = favorites::table
            .filter(favorites::tweet_id.eq_any(&tweet_ids))
            .group_by(favorites::tweet_id)
            .select((favorites::tweet_id, count_star()))
            .load::<(i32, i64)>(connection)?
            .into_iter()
            .collect::<HashMap<_, _>>();

        let favorited: HashSet<i32> = match viewer {
            Some(viewer) => favorites::table
                .filter(favorites::user_id.eq(viewer))
                .filter(favorites::tweet_id.eq_any(&tweet_ids))
                .select(favorites::tweet_id)
                .load::<i32>(connection)?
                .into_iter()
                .collect(),
            None => HashSet::new(),
        };

        let views = tweets
            .into_iter()
            .map(|tweet| {
                TweetView {
                    id: tweet.id,
                    author: Author {
                        id: tweet.user_id,
                        name: authors.get(&tweet.user_id).cloned().unwrap_or_default(),
                    },
                    favorite_count: counts.get(&tweet.id).cloned().unwrap_or(0),
                    favorited: favorited.contains(&tweet.id),
                    msg: tweet.msg,
                    created_at: tweet.created_at,
                    updated_at: tweet.updated_at,
                }
            })
            .collect();
        Ok(views)
    }

    pub fn load(tweet: Tweet, viewer: Option<i32>, connection: &mut SqliteConnection) -> Result<TweetView, ApiError> {
        let mut views = TweetView::load_many(vec![tweet], viewer, connection)?;
        views.pop().ok_or(ApiError::Internal)
    }
}

#[derive(Debug, Deserialize)]
pub struct TweetDetails {
    msg: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TweetContainer<T> {
    tweet: T,
}

#[derive(Debug, Serialize)]
pub struct TweetsContainer<T> {
    tweets: T,
}

impl<T> TweetsContainer<T> {
    pub fn new(tweets: T) -> Self {
        TweetsContainer { tweets }
    }
}

#[post("/tweets", format = "json", data = "<details>")]
pub fn create(
    mut connection: DbConnection,
    current_user: CurrentUser,
    details: Json<TweetContainer<TweetDetails>>,
) -> ApiResult<TweetContainer<TweetView>> {
    let Identity { user_id } = current_user?;
    let tweet = Tweet::create(user_id, &details.tweet.msg, &mut connection)?;
    let view = TweetView::load(tweet, Some(user_id), &mut connection)?;
    Ok(Json(TweetContainer { tweet: view }))
}

#[get("/tweets/<tweet_id>")]
pub fn show(
    mut connection: DbConnection,
    current_user: Option<Identity>,
    tweet_id: i32,
) -> ApiResult<TweetContainer<TweetView>> {
    let tweet = Tweet::load(tweet_id, &mut connection)?;
    let viewer = current_user.map(|identity| identity.user_id);
    let view = TweetView::load(tweet, viewer, &mut connection)?;
    Ok(Json(TweetContainer { tweet: view }))
}

#[post("/favorite/<tweet_id>")]
pub fn favorite_tweet(
    mut connection: DbConnection,
    current_user: CurrentUser,
    tweet_id: i32,
) -> ApiResult<TweetContainer<TweetView>> {
    let Identity { user_id } = current_user?;
    favorite(user_id, tweet_id, &mut connection)?;
    let tweet = Tweet::load(tweet_id, &mut connection)?;
    let view = TweetView::load(tweet, Some(user_id), &mut connection)?;
    Ok(Json(TweetContainer { tweet: view }))
}

#[post("/unfavorite/<tweet_id>")]
pub fn unfavorite_tweet(
    mut connection: DbConnection,
    current_user: CurrentUser,
    tweet_id: i32,
) -> ApiResult<TweetContainer<TweetView>> {
    let Identity { user_id } = current_user?;
    unfavorite(user_id, tweet_id, &mut connection)?;
    let tweet = Tweet::load(tweet_id, &mut connection)?;
    let view = TweetView::load(tweet, Some(user_id), &mut connection)?;
    Ok(Json(TweetContainer { tweet: view }))
}
