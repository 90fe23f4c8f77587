use anyhow::{Context, Result};
use std::env;

const DEFAULT_MAX_UPLOAD_MB: usize = 50;
const DEFAULT_MAX_SESSIONS: usize = 100;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub max_sessions: usize,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let max_upload_mb: usize = match env::var("MAX_UPLOAD_MB") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_UPLOAD_MB has an invalid value: {}", raw))?,
            Err(_) => DEFAULT_MAX_UPLOAD_MB,
        };
        let max_sessions: usize = match env::var("MAX_SESSIONS") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_SESSIONS has an invalid value: {}", raw))?,
            Err(_) => DEFAULT_MAX_SESSIONS,
        };
        if max_sessions == 0 {
            anyhow::bail!("MAX_SESSIONS must be greater than zero");
        }

        Ok(Self {
            bind_addr,
            max_upload_bytes: megabytes_to_bytes(max_upload_mb)?,
            max_sessions,
        })
    }
}

fn megabytes_to_bytes(megabytes: usize) -> Result<usize> {
    megabytes
        .checked_mul(1024 * 1024)
        .with_context(|| format!("MAX_UPLOAD_MB is too large: {}", megabytes))
}
