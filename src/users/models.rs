use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use jwt::{RegisteredClaims, SignWithKey, VerifyWithKey};
use log::info;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::Sha256;

use crate::db::schema::users;
use crate::types::ApiError;
use crate::utils::serialize_date;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub mailaddress: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "serialize_date")]
    pub updated_at: NaiveDateTime,
}

/// The acting user, resolved from a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|_| ApiError::Internal)
    }

    pub fn verify_password(&self, password_to_verify: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password_to_verify.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn token(&self, secret: &str, ttl_hours: i64) -> Result<String, ApiError> {
        let key = signing_key(secret)?;
        let now = Utc::now().timestamp();
        let claims = RegisteredClaims {
            issuer: Some(self.mailaddress.clone()),
            subject: Some(self.id.to_string()),
            issued_at: Some(now as u64),
            expiration: Some((now + ttl_hours * 3600) as u64),
            ..Default::default()
        };
        claims.sign_with_key(&key).map_err(|_| ApiError::Internal)
    }

    pub fn load(user_id: i32, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        users::table
            .find(user_id)
            .select(User::as_select())
            .first(connection)
            .optional()?
            .ok_or(ApiError::NotFound("user"))
    }

    pub fn load_by_mailaddress(address: &str, connection: &mut SqliteConnection) -> Result<User, ApiError> {
        users::table
            .filter(users::mailaddress.eq(address))
            .select(User::as_select())
            .first(connection)
            .optional()?
            .ok_or(ApiError::NotFound("user"))
    }

    pub fn exists(user_id: i32, connection: &mut SqliteConnection) -> Result<bool, ApiError> {
        use diesel::dsl::exists;
        use diesel::select;

        let found = select(exists(users::table.find(user_id))).get_result::<bool>(connection)?;
        Ok(found)
    }

    /// Removes the user together with its tweets, favorites and follow edges.
    pub fn delete(user_id: i32, connection: &mut SqliteConnection) -> Result<(), ApiError> {
        let deleted = diesel::delete(users::table.find(user_id)).execute(connection)?;
        if deleted == 0 {
            return Err(ApiError::NotFound("user"));
        }
        info!("user {} deleted", user_id);
        Ok(())
    }
}

impl Identity {
    pub fn from_token(token: &str, secret: &str) -> Result<Identity, ApiError> {
        let key = signing_key(secret)?;
        let claims: RegisteredClaims = token.verify_with_key(&key).map_err(|_| ApiError::Unauthorized)?;
        if let Some(expiration) = claims.expiration {
            if (Utc::now().timestamp() as u64) >= expiration {
                return Err(ApiError::Unauthorized);
            }
        }
        let user_id = claims
            .subject
            .as_ref()
            .and_then(|sub| sub.parse::<i32>().ok())
            .ok_or(ApiError::Unauthorized)?;
        Ok(Identity { user_id })
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|_| ApiError::Internal)
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub mailaddress: &'a str,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
