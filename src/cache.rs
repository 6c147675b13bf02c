// src/cache.rs

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::common::error::AppError;

/// Colaborador de cache. A invalidação é "melhor esforço": quem chama
/// apenas loga a falha, o banco continua sendo a fonte da verdade.
#[async_trait]
pub trait BookingCache: Send + Sync {
    async fn invalidate(&self, keys: &[String]) -> Result<(), AppError>;
}

/// Chaves de cache ligadas à agenda de um barbeiro.
pub fn provider_cache_keys(provider_id: i64) -> Vec<String> {
    vec![
        format!("provider:{provider_id}:bookings"),
        format!("provider:{provider_id}:availability"),
    ]
}

#[derive(Clone)]
pub struct RedisBookingCache {
    conn_manager: ConnectionManager,
}

impl RedisBookingCache {
    pub async fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = Client::open(redis_url)
            .map_err(|e| AppError::Cache(format!("Falha ao criar o cliente Redis: {e}")))?;

        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Falha ao conectar no Redis: {e}")))?;

        Ok(Self { conn_manager })
    }
}

#[async_trait]
impl BookingCache for RedisBookingCache {
    async fn invalidate(&self, keys: &[String]) -> Result<(), AppError> {
        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn_manager.clone();
        let removed: i64 = conn
            .del(keys)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        tracing::debug!(removed, keys = ?keys, "Cache invalidado");
        Ok(())
    }
}

/// Usado quando `REDIS_URL` não está configurada.
#[derive(Debug, Clone, Default)]
pub struct NoopCache;

#[async_trait]
impl BookingCache for NoopCache {
    async fn invalidate(&self, _keys: &[String]) -> Result<(), AppError> {
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingCache;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::BookingCache;
    use crate::common::error::AppError;

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    enum Mode {
        #[default]
        Ok,
        Failing,
        // Nunca responde, como um Redis travado
        Stalled,
    }

    /// Grava as invalidações recebidas; pode ser configurado para falhar ou travar.
    #[derive(Default)]
    pub struct RecordingCache {
        calls: Mutex<Vec<Vec<String>>>,
        mode: Mode,
    }

    impl RecordingCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            Self { calls: Mutex::new(Vec::new()), mode: Mode::Failing }
        }

        pub fn stalled() -> Self {
            Self { calls: Mutex::new(Vec::new()), mode: Mode::Stalled }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl BookingCache for RecordingCache {
        async fn invalidate(&self, keys: &[String]) -> Result<(), AppError> {
            self.calls
                .lock()
                .map_err(|_| AppError::Cache("Mutex do cache envenenado".into()))?
                .push(keys.to_vec());

            match self.mode {
                Mode::Ok => Ok(()),
                Mode::Failing => Err(AppError::Cache("Redis indisponível".into())),
                Mode::Stalled => std::future::pending().await,
            }
        }
    }
}
