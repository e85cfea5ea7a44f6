use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub cron_secret: String,
    pub host: String,
    pub port: u16,
    pub app_base_url: String,
    // Delivery
    pub default_country_code: String,
    pub delivery_batch_size: i64,
    pub delivery_throttle_ms: u64,
    /// `0` disables the in-process sweep loop.
    pub delivery_interval_secs: u64,
    pub sweep_lease_secs: u64,
    /// Rows left `processing` longer than this are marked failed.
    pub stale_processing_secs: i64,
    pub dedup_window_secs: i64,
    pub gateway_timeout_secs: u64,
    pub retention_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            cron_secret: required("CRON_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parsed("PORT", 8080)?,
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            default_country_code: env::var("DEFAULT_COUNTRY_CODE")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "55".into()),
            delivery_batch_size: parsed("DELIVERY_BATCH_SIZE", 10)?,
            delivery_throttle_ms: parsed("DELIVERY_THROTTLE_MS", 2000)?,
            delivery_interval_secs: parsed("DELIVERY_INTERVAL_SECS", 60)?,
            sweep_lease_secs: parsed("SWEEP_LEASE_SECS", 300)?,
            stale_processing_secs: parsed("STALE_PROCESSING_SECS", 900)?,
            dedup_window_secs: parsed("DEDUP_WINDOW_SECS", 300)?,
            gateway_timeout_secs: parsed("GATEWAY_TIMEOUT_SECS", 30)?,
            retention_days: parsed("RETENTION_DAYS", 180)?,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_and_rejects_garbage() {
        assert_eq!(parsed::<u64>("SHUTTERBOOK_TEST_UNSET_KEY", 42).unwrap(), 42);

        env::set_var("SHUTTERBOOK_TEST_BATCH", " 25 ");
        assert_eq!(parsed::<i64>("SHUTTERBOOK_TEST_BATCH", 10).unwrap(), 25);

        env::set_var("SHUTTERBOOK_TEST_THROTTLE", "fast");
        let err = parsed::<u64>("SHUTTERBOOK_TEST_THROTTLE", 2000).unwrap_err();
        assert!(err.to_string().contains("SHUTTERBOOK_TEST_THROTTLE"));
    }
}
