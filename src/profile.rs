use chrono::{NaiveDateTime, Utc};
use diesel::dsl::exists;
use diesel::prelude::*;
use diesel::{insert_into, select};
use log::{debug, info};
use rocket::serde::json::Json;
use serde::Serialize;
use std::collections::HashSet;

use crate::db::schema::{follows, users};
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, ValidationError};
use crate::users::{CurrentUser, Identity, User};

#[derive(Insertable)]
#[diesel(table_name = follows)]
struct NewFollow {
    follower_id: i32,
    following_id: i32,
    created_at: NaiveDateTime,
}

/// Adds the edge `actor -> target`. Returns `false` when it already existed.
/// Following yourself is refused.
pub fn follow(actor: i32, target: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    if actor == target {
        return Err(ValidationError::from("following_id", "You cannot follow yourself").into());
    }
    connection.immediate_transaction(|conn| {
        if !User::exists(target, conn)? || !User::exists(actor, conn)? {
            return Err(ApiError::NotFound("user"));
        }
        let inserted = insert_into(follows::table)
            .values(&NewFollow {
                follower_id: actor,
                following_id: target,
                created_at: Utc::now().naive_utc(),
            })
            .on_conflict((follows::follower_id, follows::following_id))
            .do_nothing()
            .execute(conn)?;
        if inserted > 0 {
            info!("user {} now follows {}", actor, target);
        } else {
            debug!("user {} already follows {}", actor, target);
        }
        Ok(inserted > 0)
    })
}

/// Removes the edge `actor -> target` if present.
pub fn unfollow(actor: i32, target: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    connection.immediate_transaction(|conn| {
        if !User::exists(target, conn)? {
            return Err(ApiError::NotFound("user"));
        }
        let deleted = diesel::delete(
            follows::table
                .filter(follows::follower_id.eq(actor))
                .filter(follows::following_id.eq(target)),
        ).execute(conn)?;
        if deleted > 0 {
            info!("user {} unfollowed {}", actor, target);
        } else {
            debug!("user {} was not following {}", actor, target);
        }
        Ok(deleted > 0)
    })
}

pub fn is_following(actor: i32, target: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
    let found = select(exists(
        follows::table
            .filter(follows::follower_id.eq(actor))
            .filter(follows::following_id.eq(target)),
    )).get_result::<bool>(connection)?;
    Ok(found)
}

/// Users following `user_id`, in the order they started following.
pub fn followers_of(user_id: i32, connection: &mut SqliteConnection) -> Result<Vec<User>, ApiError> {
    if !User::exists(user_id, connection)? {
        return Err(ApiError::NotFound("user"));
    }
    let followers = users::table
        .inner_join(follows::table.on(follows::follower_id.eq(users::id)))
        .filter(follows::following_id.eq(user_id))
        .order(follows::id.asc())
        .select(User::as_select())
        .load(connection)?;
    Ok(followers)
}

/// Users `user_id` follows, in the order they were followed.
pub fn following_of(user_id: i32, connection: &mut SqliteConnection) -> Result<Vec<User>, ApiError> {
    if !User::exists(user_id, connection)? {
        return Err(ApiError::NotFound("user"));
    }
    let following = users::table
        .inner_join(follows::table.on(follows::following_id.eq(users::id)))
        .filter(follows::follower_id.eq(user_id))
        .order(follows::id.asc())
        .select(User::as_select())
        .load(connection)?;
    Ok(following)
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    profile: Profile,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    pub following: bool,
}

impl Profile {
    pub fn new(user: User, following: bool) -> Self {
        Profile {
            id: user.id,
            name: user.name,
            following,
        }
    }

    /// Profiles for `people`, flagged with whether `viewer` follows each one.
    pub fn load_many(
        people: Vec<User>,
        viewer: i32,
        connection: &mut SqliteConnection,
    ) -> Result<Vec<Profile>, ApiError> {
        let ids: Vec<i32> = people.iter().map(|u| u.id).collect();
        let followed = follows::table
            .filter(follows::follower_id.eq(viewer))
            .filter(follows::following_id.eq_any(&ids))
            .select(follows::following_id)
            .load::<i32>(connection)?
            .into_iter()
            .collect::<HashSet<_>>();
        Ok(people
            .into_iter()
            .map(|user| {
                let following = followed.contains(&user.id);
                Profile::new(user, following)
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
pub struct ProfilesContainer {
    users: Vec<Profile>,
}

#[post("/follow/<user_id>")]
pub fn follow_user(
    mut connection: DbConnection,
    current_user: CurrentUser,
    user_id: i32,
) -> ApiResult<ProfileResponse> {
    let Identity { user_id: actor } = current_user?;
    follow(actor, user_id, &mut connection)?;
    let target = User::load(user_id, &mut connection)?;
    Ok(Json(ProfileResponse {
        profile: Profile::new(target, true),
    }))
}

#[post("/unfollow/<user_id>")]
pub fn unfollow_user(
    mut connection: DbConnection,
    current_user: CurrentUser,
    user_id: i32,
) -> ApiResult<ProfileResponse> {
    let Identity { user_id: actor } = current_user?;
    unfollow(actor, user_id, &mut connection)?;
    let target = User::load(user_id, &mut connection)?;
    Ok(Json(ProfileResponse {
        profile: Profile::new(target, false),
    }))
}

#[get("/followers")]
pub fn followers(mut connection: DbConnection, current_user: CurrentUser) -> ApiResult<ProfilesContainer> {
    let Identity { user_id } = current_user?;
    let people = followers_of(user_id, &mut connection)?;
    let users = Profile::load_many(people, user_id, &mut connection)?;
    Ok(Json(ProfilesContainer { users }))
}

#[get("/following")]
pub fn following(mut connection: DbConnection, current_user: CurrentUser) -> ApiResult<ProfilesContainer> {
    let Identity { user_id } = current_user?;
    let users = following_of(user_id, &mut connection)?
        .into_iter()
        .map(|user| Profile::new(user, true))
        .collect();
    Ok(Json(ProfilesContainer { users }))
}
