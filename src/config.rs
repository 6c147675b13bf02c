// src/config.rs

use std::{env, fmt::Display, net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use chrono::NaiveTime;
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    cache::{BookingCache, NoopCache, RedisBookingCache},
    common::validation::RequestValidator,
    db::PgBookingStore,
    services::{
        cancellation::{CancellationPolicy, NoCancellationFee, NoticeWindowPolicy},
        BookingRules, BookingService,
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub database_max_connections: u32,
    pub server_addr: SocketAddr,
    pub redis_url: Option<String>,
    pub buffer_minutes: i64,
    pub cancellation_notice_hours: i64,
    pub late_cancellation_fee_rate: Decimal,
    pub workday_open: NaiveTime,
    pub workday_close: NaiveTime,
    pub slot_step_minutes: i64,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5)?,
            server_addr: parse_var("SERVER_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty()),
            buffer_minutes: parse_var("BOOKING_BUFFER_MINUTES", 0)?,
            cancellation_notice_hours: parse_var("CANCELLATION_NOTICE_HOURS", 24)?,
            late_cancellation_fee_rate: parse_var("LATE_CANCELLATION_FEE_RATE", Decimal::ZERO)?,
            workday_open: parse_time_var("WORKDAY_OPEN", "09:00")?,
            workday_close: parse_time_var("WORKDAY_CLOSE", "18:00")?,
            slot_step_minutes: parse_var("SLOT_STEP_MINUTES", 30)?,
        };

        settings.check()?;
        Ok(settings)
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.buffer_minutes < 0 {
            bail!("BOOKING_BUFFER_MINUTES não pode ser negativo");
        }
        if self.slot_step_minutes <= 0 {
            bail!("SLOT_STEP_MINUTES deve ser positivo");
        }
        if self.workday_close <= self.workday_open {
            bail!("WORKDAY_CLOSE deve ser posterior a WORKDAY_OPEN");
        }
        if self.late_cancellation_fee_rate < Decimal::ZERO || self.late_cancellation_fee_rate > Decimal::ONE {
            bail!("LATE_CANCELLATION_FEE_RATE deve estar entre 0 e 1");
        }
        Ok(())
    }

    pub fn booking_rules(&self) -> BookingRules {
        BookingRules {
            buffer_minutes: self.buffer_minutes,
            workday_open: self.workday_open,
            workday_close: self.workday_close,
            slot_step_minutes: self.slot_step_minutes,
        }
    }

    pub fn cancellation_policy(&self) -> Arc<dyn CancellationPolicy> {
        if self.late_cancellation_fee_rate.is_zero() {
            Arc::new(NoCancellationFee)
        } else {
            Arc::new(NoticeWindowPolicy::new(
                self.cancellation_notice_hours,
                self.late_cancellation_fee_rate,
            ))
        }
    }
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Valor inválido para {name} ('{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}

fn parse_time_var(name: &str, default: &str) -> anyhow::Result<NaiveTime> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("Valor inválido para {name} ('{raw}'), use HH:MM"))
}

pub async fn connect_database(settings: &Settings) -> anyhow::Result<PgPool> {
    let db_pool = PgPoolOptions::new()
        .max_connections(settings.database_max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&settings.database_url)
        .await
        .context("Falha ao conectar ao banco de dados")?;

    tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
    Ok(db_pool)
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub booking_service: BookingService,
    pub validator: RequestValidator,
}

impl AppState {
    pub fn new(booking_service: BookingService) -> Self {
        Self {
            booking_service,
            validator: RequestValidator::new(),
        }
    }

    /// Monta o gráfico de dependências de produção.
    pub async fn from_settings(settings: &Settings, db_pool: PgPool) -> Self {
        let cache: Arc<dyn BookingCache> = match &settings.redis_url {
            Some(url) => match RedisBookingCache::new(url).await {
                Ok(redis) => {
                    tracing::info!("✅ Cache Redis conectado");
                    Arc::new(redis)
                }
                Err(e) => {
                    // Sem cache a aplicação continua correta, só sem invalidação
                    tracing::warn!(error = %e, "Redis indisponível, seguindo sem cache");
                    Arc::new(NoopCache)
                }
            },
            None => Arc::new(NoopCache),
        };

        let booking_service = BookingService::new(
            Arc::new(PgBookingStore::new(db_pool)),
            cache,
            settings.cancellation_policy(),
            settings.booking_rules(),
        );

        Self::new(booking_service)
    }
}
