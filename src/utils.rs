use chrono::{NaiveDateTime, SecondsFormat};
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::status::Custom;
use rocket::response::{self, Responder};
use rocket::serde::json::{Json, Value};
use serde::Serializer;

pub fn try_respond<'r>(req: &'r Request<'_>, json: Value, status: Status) -> response::Result<'static> {
    Custom(status, Json(json)).respond_to(req)
}

/// Timestamps are stored as naive UTC and rendered as RFC 3339 with millis.
pub fn serialize_date<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = date.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true);
    serializer.serialize_str(&s)
}

/// Length in characters, not bytes.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}
