use redis::aio::MultiplexedConnection;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use redis::{AsyncCommands, FromRedisValue, Script, ToRedisArgs};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
enum RedisConn {
    Cluster(Arc<Mutex<ClusterConnection>>),
    Single(Arc<Mutex<MultiplexedConnection>>),
}

macro_rules! with_conn {
    ($self:ident, $conn:ident => $body:expr) => {
        match &$self.conn {
            RedisConn::Cluster(c) => {
                let mut $conn = c.lock().await;
                $body
            }
            RedisConn::Single(c) => {
                let mut $conn = c.lock().await;
                $body
            }
        }
    };
}

#[derive(Clone)]
pub struct RedisClient {
    conn: RedisConn,
}

impl RedisClient {
    /// More than one URL selects cluster mode.
    pub async fn connect(redis_urls: &[String]) -> anyhow::Result<Self> {
        let conn = match redis_urls {
            [] => return Err(anyhow::anyhow!("No Redis URL configured")),
            [url] => {
                log::debug!("Using single Redis instance at: {}", url);
                let client = redis::Client::open(url.as_str())?;
                let conn = client.get_multiplexed_async_connection().await?;
                RedisConn::Single(Arc::new(Mutex::new(conn)))
            }
            urls => {
                log::debug!("Using Redis Cluster with URLs: {:?}", urls);
                let client = ClusterClient::new(urls.to_vec())?;
                let conn = client.get_async_connection().await?;
                RedisConn::Cluster(Arc::new(Mutex::new(conn)))
            }
        };
        Ok(Self { conn })
    }

    pub async fn exists(&self, key: &str) -> anyhow::Result<bool> {
        with_conn!(self, conn => {
            let found: bool = conn.exists(key).await?;
            Ok(found)
        })
    }

    pub async fn hgetall(&self, key: &str) -> anyhow::Result<HashMap<String, Vec<u8>>> {
        with_conn!(self, conn => {
            let fields: HashMap<String, Vec<u8>> = conn.hgetall(key).await?;
            Ok(fields)
        })
    }

    pub async fn del(&self, key: &str) -> anyhow::Result<usize> {
        with_conn!(self, conn => {
            let removed: usize = conn.del(key).await?;
            Ok(removed)
        })
    }

    pub async fn sadd(&self, key: &str, member: &str) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: () = conn.sadd(key, member).await?;
            Ok(())
        })
    }

    pub async fn srem(&self, key: &str, member: &str) -> anyhow::Result<()> {
        with_conn!(self, conn => {
            let _: () = conn.srem(key, member).await?;
            Ok(())
        })
    }

    pub async fn smembers(&self, key: &str) -> anyhow::Result<Vec<String>> {
        with_conn!(self, conn => {
            let members: Vec<String> = conn.smembers(key).await?;
            Ok(members)
        })
    }

    /// Runs a Lua script against a single key.
    pub async fn eval<T, A>(&self, script: &Script, key: &str, args: &[A]) -> anyhow::Result<T>
    where
        T: FromRedisValue,
        A: ToRedisArgs,
    {
        let mut invocation = script.key(key);
        for arg in args {
            invocation.arg(arg);
        }
        with_conn!(self, conn => {
            let value: T = invocation.invoke_async(&mut *conn).await?;
            Ok(value)
        })
    }
}
