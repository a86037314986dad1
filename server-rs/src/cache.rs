use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::config::RedisConfig;

pub const ADMIN_STATS_KEY: &str = "admin:stats";

/// Best-effort Redis cache. Every failure degrades to a miss.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    prefix: String,
}

impl Cache {
    /// Returns `Ok(None)` when no Redis URL is configured.
    pub async fn connect(config: &RedisConfig) -> redis::RedisResult<Option<Self>> {
        let Some(url) = &config.url else {
            return Ok(None);
        };
        let client = Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Some(Self {
            conn,
            prefix: config.key_prefix.clone(),
        }))
    }

    fn key(&self, k: &str) -> String {
        format!("{}{}", self.prefix, k)
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(self.key(key)).await.ok().flatten();
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Ok(json) = serde_json::to_string(value) else {
            return;
        };
        let mut conn = self.conn.clone();
        let k = self.key(key);
        let _: Result<(), _> = if ttl_secs > 0 {
            conn.set_ex(&k, json, ttl_secs).await
        } else {
            conn.set(&k, json).await
        };
    }

    pub async fn del(&self, key: &str) {
        let mut conn = self.conn.clone();
        let _: Result<(), _> = conn.del(self.key(key)).await;
    }

    pub async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}
