use super::SessionStore;
use crate::errors::StoreError;
use deadpool_redis::redis::{AsyncCommands, Script};
use deadpool_redis::{Connection, Pool};

/// Redis-backed session store.
///
/// Each operation checks one connection out of the pool and returns it when
/// the call ends, so no connection outlives a single store operation.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Connection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn().await?;
        conn.get(key).await.map_err(StoreError::Redis)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.set(key, value).await.map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(key).await.map_err(StoreError::Redis)?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let _: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(())
    }

    fn supports_cas(&self) -> bool {
        true
    }

    async fn compare_and_set(
        &self,
        key: &str,
        old: Option<&[u8]>,
        new: &[u8],
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        // Lua keeps the read-compare-write atomic on the server side.
        let script = if old.is_some() {
            Script::new(
                r"
                if redis.call('get', KEYS[1]) == ARGV[1] then
                    redis.call('set', KEYS[1], ARGV[2])
                    return 1
                else
                    return 0
                end
            ",
            )
        } else {
            Script::new(
                r"
                if redis.call('exists', KEYS[1]) == 0 then
                    redis.call('set', KEYS[1], ARGV[1])
                    return 1
                else
                    return 0
                end
            ",
            )
        };

        let mut invocation = script.key(key);
        if let Some(old) = old {
            invocation.arg(old).arg(new);
        } else {
            invocation.arg(new);
        }

        let swapped: bool = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::Redis)?;
        Ok(swapped)
    }
}
