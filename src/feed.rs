//! Read-side queries: every feed is computed from the current rows, newest
//! first unless stated otherwise, and capped at `FEED_LIMIT`.

use diesel::dsl::count;
use diesel::prelude::*;
use rocket::serde::json::Json;
use serde::Serialize;

use crate::db::schema::{favorites, follows, tweets};
use crate::db::DbConnection;
use crate::profile::{is_following, Profile};
use crate::tweet::{Tweet, TweetView, TweetsContainer};
use crate::types::{ApiError, ApiResult};
use crate::users::{CurrentUser, Identity, User};

pub const FEED_LIMIT: i64 = 100;
pub const TRENDING_THRESHOLD: i64 = 2;

/// Tweets by everyone `user_id` follows. No follows, no tweets.
pub fn timeline(user_id: i32, connection: &mut SqliteConnection) -> Result<Vec<Tweet>, ApiError> {
    let followed = follows::table
        .filter(follows::follower_id.eq(user_id))
        .select(follows::following_id);
    let tweets = tweets::table
        .filter(tweets::user_id.eq_any(followed))
        .order((tweets::created_at.desc(), tweets::id.desc()))
        .limit(FEED_LIMIT)
        .select(Tweet::as_select())
        .load(connection)?;
    Ok(tweets)
}

/// Tweets with at least `TRENDING_THRESHOLD` favorites, most favorited first.
/// Ties go to the newer tweet.
pub fn trending(connection: &mut SqliteConnection) -> Result<Vec<Tweet>, ApiError> {
    let tweets = tweets::table
        .inner_join(favorites::table)
        .group_by(tweets::id)
        .having(count(favorites::id).ge(TRENDING_THRESHOLD))
        .order((count(favorites::id).desc(), tweets::created_at.desc(), tweets::id.desc()))
        .select(Tweet::as_select())
        .limit(FEED_LIMIT)
        .load(connection)?;
    Ok(tweets)
}

pub fn profile_feed(user_id: i32, connection: &mut SqliteConnection) -> Result<Vec<Tweet>, ApiError> {
    if !User::exists(user_id, connection)? {
        return Err(ApiError::NotFound("user"));
    }
    let tweets = tweets::table
        .filter(tweets::user_id.eq(user_id))
        .order((tweets::created_at.desc(), tweets::id.desc()))
        .limit(FEED_LIMIT)
        .select(Tweet::as_select())
        .load(connection)?;
    Ok(tweets)
}

/// Tweets `user_id` has favorited, most recently favorited first.
pub fn favorites_of(user_id: i32, connection: &mut SqliteConnection) -> Result<Vec<Tweet>, ApiError> {
    let tweets = tweets::table
        .inner_join(favorites::table)
        .filter(favorites::user_id.eq(user_id))
        .order((favorites::created_at.desc(), favorites::id.desc()))
        .limit(FEED_LIMIT)
        .select(Tweet::as_select())
        .load(connection)?;
    Ok(tweets)
}

/// Substring search over tweet text. Uses SQLite `LIKE`, so matching is
/// case-insensitive for ASCII. A blank query matches nothing.
pub fn search(query: &str, connection: &mut SqliteConnection) -> Result<Vec<Tweet>, ApiError> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    let pattern = format!("%{}%", escape_like(query));
    let tweets = tweets::table
        .filter(tweets::msg.like(pattern).escape('\\'))
        .order((tweets::created_at.desc(), tweets::id.desc()))
        .limit(FEED_LIMIT)
        .select(Tweet::as_select())
        .load(connection)?;
    Ok(tweets)
}

fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[get("/trending")]
pub fn trending_tweets(
    mut connection: DbConnection,
    current_user: Option<Identity>,
) -> ApiResult<TweetsContainer<Vec<TweetView>>> {
    let viewer = current_user.map(|identity| identity.user_id);
    let tweets = trending(&mut connection)?;
    Ok(Json(TweetsContainer::new(TweetView::load_many(tweets, viewer, &mut connection)?)))
}

#[get("/timeline")]
pub fn timeline_tweets(
    mut connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<TweetsContainer<Vec<TweetView>>> {
    let Identity { user_id } = current_user?;
    let tweets = timeline(user_id, &mut connection)?;
    Ok(Json(TweetsContainer::new(TweetView::load_many(tweets, Some(user_id), &mut connection)?)))
}

#[get("/favorites")]
pub fn favorite_tweets(
    mut connection: DbConnection,
    current_user: CurrentUser,
) -> ApiResult<TweetsContainer<Vec<TweetView>>> {
    let Identity { user_id } = current_user?;
    let tweets = favorites_of(user_id, &mut connection)?;
    Ok(Json(TweetsContainer::new(TweetView::load_many(tweets, Some(user_id), &mut connection)?)))
}

#[get("/search?<q>")]
pub fn search_tweets(
    mut connection: DbConnection,
    current_user: CurrentUser,
    q: Option<String>,
) -> ApiResult<TweetsContainer<Vec<TweetView>>> {
    let Identity { user_id } = current_user?;
    let tweets = search(q.as_deref().unwrap_or(""), &mut connection)?;
    Ok(Json(TweetsContainer::new(TweetView::load_many(tweets, Some(user_id), &mut connection)?)))
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    profile: Profile,
    tweets: Vec<TweetView>,
}

#[get("/users/<user_id>")]
pub fn user_page(mut connection: DbConnection, current_user: CurrentUser, user_id: i32) -> ApiResult<UserPage> {
    let Identity { user_id: viewer } = current_user?;
    let user = User::load(user_id, &mut connection)?;
    let following = is_following(viewer, user_id, &mut connection)?;
    let tweets = profile_feed(user_id, &mut connection)?;
    Ok(Json(UserPage {
        profile: Profile::new(user, following),
        tweets: TweetView::load_many(tweets, Some(viewer), &mut connection)?,
    }))
}
