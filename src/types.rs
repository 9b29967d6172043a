use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use log::error;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::utils::try_respond;

pub trait Validate
where
    Self: Sized,
{
    type Error;
    fn validate(self, connection: &mut SqliteConnection) -> Result<Self, Self::Error>;
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(&'static str),
    Validation(ValidationError),
    Unauthorized,
    Store(DieselError),
    Internal,
}

impl From<DieselError> for ApiError {
    fn from(err: DieselError) -> ApiError {
        match err {
            DieselError::NotFound => ApiError::NotFound("record"),
            other => ApiError::Store(other),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> ApiError {
        ApiError::Validation(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound(entity) => write!(f, "{} not found", entity),
            ApiError::Validation(errors) => write!(f, "validation failed: {}", errors),
            ApiError::Unauthorized => write!(f, "unauthorized"),
            ApiError::Store(err) => write!(f, "store error: {}", err),
            ApiError::Internal => write!(f, "internal error"),
        }
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.0.get(key).map(|errors| errors.as_slice())
    }

    /// `Ok(())` when no errors were collected.
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.0.keys().collect();
        keys.sort();
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", key, self.0[key].join(", "))?;
        }
        Ok(())
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            ApiError::NotFound(entity) => {
                let body = json!({ "errors": ValidationError::from(entity, "not found") });
                try_respond(req, body, Status::NotFound)
            }

            ApiError::Validation(error) => {
                let body = json!({ "errors": error });
                try_respond(req, body, Status::UnprocessableEntity)
            }

            ApiError::Unauthorized => {
                let body = json!({ "errors": {
                    "status": "401 Unauthorized"
                }});
                try_respond(req, body, Status::Unauthorized)
            }

            ApiError::Store(err) => {
                error!("store failure on {}: {}", req.uri(), err);
                Err(Status::InternalServerError)
            }

            ApiError::Internal => Err(Status::InternalServerError),
        }
    }
}
