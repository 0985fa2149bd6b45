use anyhow::{Context, Result};
use crates::domain::value_objects::money::{CommissionRate, DEFAULT_COMMISSION_RATE_BPS};
use std::str::FromStr;

use super::config_model::{Auth, BackendServer, Database, DotEnvyConfig, Escrow};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_LOCK_TIMEOUT_MS: u64 = 3_000;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?,
        body_limit: required("SERVER_BODY_LIMIT")?,
        timeout: required("SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").context("DATABASE_URL is invalid")?,
        max_connections: optional("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
    };

    let auth = Auth {
        jwt_secret: std::env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .context("JWT_SECRET is invalid")?,
    };

    let commission_rate_bps = optional("ESCROW_COMMISSION_RATE_BPS", DEFAULT_COMMISSION_RATE_BPS)?;
    let escrow = Escrow {
        commission_rate: CommissionRate::from_bps(commission_rate_bps)
            .context("ESCROW_COMMISSION_RATE_BPS is invalid")?,
        lock_timeout_ms: optional("ESCROW_LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS)?,
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        escrow,
    })
}

fn required<T>(key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    std::env::var(key)
        .with_context(|| format!("{key} is invalid"))?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn optional<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} is invalid")),
        _ => Ok(default),
    }
}
