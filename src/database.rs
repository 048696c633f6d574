use diesel_async::pooled_connection::bb8;
use diesel_async::pooled_connection::{AsyncDieselConnectionManager, PoolError};
use diesel_async::AsyncMysqlConnection;
use displaydoc::Display;
use thiserror::Error;

use crate::config::DatabaseConfig;

pub type Conn<'c> = bb8::PooledConnection<'c, AsyncMysqlConnection>;

#[derive(Debug, Display, Error)]
pub enum Error {
    /// Failed to create database pool: {0}
    CreatePool(PoolError),
    /// Failed to checkout a database connection: {0}
    Checkout(bb8::RunError),
}

/// A clonable handle to the MySQL connection pool.
#[derive(Clone)]
pub struct Pool {
    pool: bb8::Pool<AsyncMysqlConnection>,
}

impl Pool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, Error> {
        let manager = AsyncDieselConnectionManager::<AsyncMysqlConnection>::new(&config.url);
        let pool = bb8::Pool::builder()
            .max_size(config.max_conn)
            .build(manager)
            .await
            .map_err(Error::CreatePool)?;

        Ok(Pool { pool })
    }

    pub async fn conn(&self) -> Result<Conn<'_>, Error> {
        self.pool.get().await.map_err(Error::Checkout)
    }
}
