//! Redis-backed durable store.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisResult;
use session_core::{Error, Result};
use telemetry::metrics;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::store::{ttl_secs, DurableStore};

/// Durable store talking to Redis through a shared, self-reconnecting
/// connection manager.
///
/// The connection is opened lazily so a node can boot while Redis is down;
/// every call (connect included) is bounded by `timeout`.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    timeout: Duration,
}

impl RedisStore {
    /// Creates a store for `url`. Does not connect.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::config(format!("invalid redis url: {}", e)))?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            timeout,
        })
    }

    async fn connection(&self) -> RedisResult<ConnectionManager> {
        self.conn
            .get_or_try_init(|| self.client.get_connection_manager())
            .await
            .cloned()
    }

    /// Runs one command under the store timeout.
    async fn bounded<T>(
        &self,
        op: &'static str,
        key: &str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> Result<T> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, fut).await;
        metrics()
            .durable_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match outcome {
            Ok(Ok(value)) => {
                debug!(op, key, "Redis command succeeded");
                Ok(value)
            }
            Ok(Err(e)) => Err(Error::durable(format!("{} {} failed: {}", op, key, e))),
            Err(_) => Err(Error::durable(format!(
                "{} {} timed out after {}ms",
                op,
                key,
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let fut = async {
            let mut conn = self.connection().await?;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(value)
        };
        self.bounded("GET", key, fut).await
    }

    async fn setex(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let fut = async {
            let mut conn = self.connection().await?;
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs(ttl))
                .arg(value)
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(())
        };
        self.bounded("SETEX", key, fut).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        let fut = async {
            let mut conn = self.connection().await?;
            let _: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
            Ok::<_, redis::RedisError>(())
        };
        self.bounded("DEL", key, fut).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let fut = async {
            let mut conn = self.connection().await?;
            let _: i64 = redis::cmd("EXPIRE")
                .arg(key)
                .arg(ttl_secs(ttl))
                .query_async(&mut conn)
                .await?;
            Ok::<_, redis::RedisError>(())
        };
        self.bounded("EXPIRE", key, fut).await
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
