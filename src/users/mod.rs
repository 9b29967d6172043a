use chrono::Utc;
use diesel::insert_into;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::{info, warn};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::serde::json::{json, Json, Value};
use rocket::State;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::schema::users;
use crate::db::DbConnection;
use crate::types::{ApiError, ApiResult, Validate, ValidationError};

pub mod models;
mod utils;

pub use self::models::{Identity, User};
use self::utils::*;

pub type CurrentUser = Result<Identity, ApiError>;

#[derive(Debug, Deserialize)]
pub struct RegistrationDetails {
    pub name: String,
    pub mailaddress: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Registration {
    user: RegistrationDetails,
}

impl Validate for RegistrationDetails {
    type Error = ApiError;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error> {
        let mut errors = ValidationError::default();

        if let Err(e) = validate_name(&self.name) {
            errors.merge(e);
        }

        match validate_email(&self.mailaddress, connection) {
            Ok(_) => {}
            Err(ApiError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }

        if let Err(e) = validate_password(&self.password) {
            errors.merge(e);
        }

        errors.into_result()?;
        Ok(self)
    }
}

/// Creates a user account. A concurrent registration of the same address
/// loses on the unique index and is reported like any other duplicate.
pub fn register(details: RegistrationDetails, connection: &mut SqliteConnection) -> Result<User, ApiError> {
    let details = details.validate(connection)?;
    let now = Utc::now().naive_utc();
    let new_user = models::NewUser {
        name: details.name.trim(),
        mailaddress: &details.mailaddress,
        password_hash: User::make_password(&details.password)?,
        created_at: now,
        updated_at: now,
    };

    let user = insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(connection)
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                ApiError::from(ValidationError::from(
                    "mailaddress",
                    "This email address is already registered",
                ))
            }
            other => other.into(),
        })?;
    info!("registered user {}", user.id);
    Ok(user)
}

/// Resolves credentials to a user. Unknown addresses and wrong passwords
/// produce the same error.
pub fn authenticate(mailaddress: &str, password: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
    let invalid = || ValidationError::from("password", "Email address or password is incorrect");
    let user = match User::load_by_mailaddress(mailaddress, connection) {
        Ok(user) => user,
        Err(ApiError::NotFound(_)) => {
            warn!("login attempt for unknown address");
            return Err(invalid().into());
        }
        Err(other) => return Err(other),
    };
    if user.verify_password(password) {
        Ok(user)
    } else {
        warn!("failed login for user {}", user.id);
        Err(invalid().into())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Identity {
    type Error = ApiError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = match request.rocket().state::<Config>() {
            Some(config) => config,
            None => return Outcome::Error((Status::InternalServerError, ApiError::Internal)),
        };
        match request.headers().get_one("Authorization") {
            Some(token_header) => {
                let token = token_header.trim_start_matches("Token ").trim();
                match Identity::from_token(token, &config.secret_key) {
                    Ok(identity) => Outcome::Success(identity),
                    Err(e) => Outcome::Error((Status::Unauthorized, e)),
                }
            }
            None => Outcome::Error((Status::Unauthorized, ApiError::Unauthorized)),
        }
    }
}

#[derive(Debug, Serialize)]
struct AuthenticatedUser<'a> {
    #[serde(flatten)]
    user: &'a User,
    token: String,
}

fn with_token(user: &User, config: &Config) -> Result<Value, ApiError> {
    let token = user.token(&config.secret_key, config.token_ttl_hours)?;
    Ok(json!({ "user": AuthenticatedUser { user, token } }))
}

#[post("/users", format = "json", data = "<registration>")]
pub fn register_user(
    mut connection: DbConnection,
    config: &State<Config>,
    registration: Json<Registration>,
) -> ApiResult<Value> {
    let user = register(registration.into_inner().user, &mut connection)?;
    Ok(Json(with_token(&user, config)?))
}

#[derive(Debug, Deserialize)]
struct LoginDetails {
    pub mailaddress: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Login {
    user: LoginDetails,
}

#[post("/users/login", format = "json", data = "<login>")]
pub fn login(mut connection: DbConnection, config: &State<Config>, login: Json<Login>) -> ApiResult<Value> {
    let user = authenticate(&login.user.mailaddress, &login.user.password, &mut connection)?;
    Ok(Json(with_token(&user, config)?))
}

#[get("/user")]
pub fn current(mut connection: DbConnection, current_user: CurrentUser) -> ApiResult<Value> {
    let user = User::load(current_user?.user_id, &mut connection)?;
    Ok(Json(json!({ "user": user })))
}

#[delete("/user")]
pub fn delete_account(mut connection: DbConnection, current_user: CurrentUser) -> ApiResult<Value> {
    User::delete(current_user?.user_id, &mut connection)?;
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
pub mod testing {
    use super::*;

    pub fn user(name: &str, connection: &mut SqliteConnection) -> User {
        register(
            RegistrationDetails {
                name: name.to_string(),
                mailaddress: format!("{}@test.com", name),
                password: "password123".to_string(),
            },
            connection,
        )
        .expect("register test user")
    }
}
