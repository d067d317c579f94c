use std::sync::Arc;

use deadpool::managed::QueueMode;
use deadpool_redis::{Config as DeadpoolConfig, Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{PlitsoError, Result};

/// Redis connection manager
#[derive(Clone)]
pub struct RedisManager {
    pool: Arc<Pool>,
}

impl RedisManager {
    /// Create a new Redis manager with configuration
    pub async fn new_with_config(config: &crate::config::Config) -> Result<Self> {
        let redis_url = config.get_redis_url();

        tracing::info!(
            "Connecting to Redis at {}:{} (db: {})",
            config.redis.host,
            config.redis.port,
            config.redis.database
        );

        let mut cfg = DeadpoolConfig::from_url(&redis_url);

        cfg.pool = Some(PoolConfig {
            max_size: config.redis.pool.max_size,
            timeouts: Timeouts {
                wait: Some(config.get_pool_timeout()),
                create: Some(config.get_pool_create_timeout()),
                recycle: Some(config.get_pool_recycle_timeout()),
            },
            queue_mode: QueueMode::Fifo,
        });

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| PlitsoError::PoolCreation(e.to_string()))?;

        // Test the connection
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        tracing::info!("Redis connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a connection from the pool
    pub async fn get_connection(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    pub async fn set_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.get_connection().await?;
        conn.set::<_, _, ()>(key, json).await?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(PlitsoError::from))
            .transpose()
    }

    pub async fn del(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_connection().await?;
        conn.del::<_, ()>(keys).await?;
        Ok(())
    }

    /// Write many hash fields as JSON in one round trip
    pub async fn hset_json_many<T: Serialize>(
        &self,
        key: &str,
        entries: &[(String, T)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut fields = Vec::with_capacity(entries.len());
        for (field, value) in entries {
            fields.push((field.as_str(), serde_json::to_string(value)?));
        }
        let mut conn = self.get_connection().await?;
        conn.hset_multiple::<_, _, _, ()>(key, &fields).await?;
        Ok(())
    }

    pub async fn hget_json<T: DeserializeOwned>(&self, key: &str, field: &str) -> Result<Option<T>> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = conn.hget(key, field).await?;
        raw.map(|json| serde_json::from_str(&json).map_err(PlitsoError::from))
            .transpose()
    }

    pub async fn hvals_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let mut conn = self.get_connection().await?;
        let raw: Vec<String> = conn.hvals(key).await?;
        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(PlitsoError::from))
            .collect()
    }

    pub async fn hexists(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        Ok(conn.hexists(key, field).await?)
    }

    pub async fn rpush_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let mut conn = self.get_connection().await?;
        conn.rpush::<_, _, ()>(key, json).await?;
        Ok(())
    }

    pub async fn lrange_json<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let mut conn = self.get_connection().await?;
        let raw: Vec<String> = conn.lrange(key, 0, -1).await?;
        raw.iter()
            .map(|json| serde_json::from_str(json).map_err(PlitsoError::from))
            .collect()
    }

    pub async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.get_connection().await?;
        Ok(conn.incr(key, 1).await?)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.sadd::<_, _, ()>(key, member).await?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        conn.srem::<_, _, ()>(key, member).await?;
        Ok(())
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        Ok(conn.sismember(key, member).await?)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let mut members: Vec<String> = conn.smembers(key).await?;
        members.sort();
        Ok(members)
    }

    /// Remove a hash field and drop a key in one MULTI/EXEC
    pub async fn hdel_and_del_atomic(&self, hash: &str, field: &str, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        redis::pipe()
            .atomic()
            .hdel(hash, field)
            .ignore()
            .del(key)
            .ignore()
            .query_async::<()>(&mut *conn)
            .await?;
        Ok(())
    }
}
