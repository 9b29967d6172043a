use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection};
use diesel::result::Error as DieselError;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use log::info;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest};
use rocket::Request;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use crate::config::Config;

pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// An alias to the type for a pool of Diesel SQLite connections.
pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub struct DbConnection(pub r2d2::PooledConnection<ConnectionManager<SqliteConnection>>);

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        ParseInt(::std::num::ParseIntError);
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }

    errors {
        Migration(reason: String) {
            description("failed to run database migrations")
            display("failed to run database migrations: {}", reason)
        }
    }
}

/// Per-connection SQLite settings. Foreign keys are off by default in SQLite,
/// and the cascade rules in the schema depend on them.
#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> ::std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout.as_millis()
        )).map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Attempts to retrieve a single connection from the managed database pool. If
/// no pool is currently managed, fails with an `InternalServerError` status. If
/// no connections are available, fails with a `ServiceUnavailable` status.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for DbConnection {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<DbConnection, ()> {
        let pool = match request.rocket().state::<Pool>() {
            Some(pool) => pool,
            None => return Outcome::Error((Status::InternalServerError, ())),
        };
        match pool.get() {
            Ok(conn) => Outcome::Success(DbConnection(conn)),
            Err(_) => Outcome::Error((Status::ServiceUnavailable, ())),
        }
    }
}

// For the convenience of using an &mut DbConnection as an &mut SqliteConnection.
impl Deref for DbConnection {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DbConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

pub fn init_pool(config: &Config) -> Result<Pool> {
    let manager = ConnectionManager::<SqliteConnection>::new(config.database_url.as_str());
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: Duration::from_secs(5),
        }))
        .build(manager)?;
    run_migrations(&mut *pool.get()?)?;
    info!("database pool ready: {} ({} connections)", config.database_url, config.pool_size);
    Ok(pool)
}

pub fn run_migrations(connection: &mut SqliteConnection) -> Result<()> {
    let applied = connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| ErrorKind::Migration(e.to_string()))?;
    if !applied.is_empty() {
        info!("applied {} pending migration(s)", applied.len());
    }
    Ok(())
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use diesel::prelude::*;

    /// A fresh in-memory database with the schema applied.
    pub fn connection() -> SqliteConnection {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut conn = SqliteConnection::establish(":memory:").expect("in-memory sqlite");
        conn.batch_execute("PRAGMA foreign_keys = ON;").expect("enable foreign keys");
        run_migrations(&mut conn).expect("migrations");
        conn
    }
}
