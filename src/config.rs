use dotenv::dotenv;
use log::warn;
use std::env;

use crate::db::Result;

const DEFAULT_DATABASE_URL: &str = "twitter_clone.db";
const DEV_SECRET_KEY: &str = "dev-secret-key-change-in-production";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub pool_size: u32,
    pub token_ttl_hours: i64,
}

impl Config {
    /// Reads settings from the environment, after loading `.env` if present.
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let secret_key = match env::var("SECRET_KEY") {
            Ok(key) => key,
            Err(_) => {
                warn!("SECRET_KEY is not set, falling back to the development key");
                DEV_SECRET_KEY.to_string()
            }
        };
        let pool_size = match env::var("DATABASE_POOL_SIZE") {
            Ok(size) => size.parse::<u32>()?,
            Err(_) => 10,
        };
        let token_ttl_hours = match env::var("TOKEN_TTL_HOURS") {
            Ok(hours) => hours.parse::<i64>()?,
            Err(_) => 24,
        };

        Ok(Config {
            database_url,
            secret_key,
            pool_size,
            token_ttl_hours,
        })
    }

    pub fn with_database_url<S: Into<String>>(database_url: S) -> Config {
        Config {
            database_url: database_url.into(),
            secret_key: DEV_SECRET_KEY.to_string(),
            pool_size: 4,
            token_ttl_hours: 24,
        }
    }
}
