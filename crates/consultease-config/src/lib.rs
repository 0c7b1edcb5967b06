// [crates/consultease-config/src/lib.rs]
/*!
 * Startup configuration loading (spec §6). Configuration is read once,
 * from environment variables, at process start; nothing downstream ever
 * re-reads the environment. Keys in spec's table map to
 * `CONSULTEASE_<SECTION>_<NAME>` environment variables (e.g. `db.url` ->
 * `CONSULTEASE_DB_URL`); loading a `.env` file before calling
 * [`Config::from_env`] is the caller's responsibility (the daemon binary
 * does this with `dotenvy`, matching the external-collaborator boundary
 * in spec §1: "configuration file loading" is out of scope for this
 * crate, only the recognized-keys contract is in scope).
 */

use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required configuration key '{0}' is not set")]
    MissingRequired(&'static str),

    #[error("configuration key '{key}' has an invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub health_interval: Duration,
    pub restart_cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub batch_size: usize,
    pub batch_timeout: Duration,
    pub offline_queue_size: usize,
}

#[derive(Debug, Clone)]
pub struct ConsultationConfig {
    pub expiry: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub restart_budget: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub mqtt: MqttConfig,
    pub consultation: ConsultationConfig,
    pub service: ServiceConfig,
}

impl Config {
    /// Loads configuration from the process environment. Missing
    /// required keys (`db.url`, `mqtt.broker_host`, `mqtt.broker_port`)
    /// fail loudly rather than falling back to a default, matching spec
    /// §6 which marks them required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db: DbConfig {
                url: required_str("CONSULTEASE_DB_URL", "db.url")?,
                pool_size: optional_parsed("CONSULTEASE_DB_POOL_SIZE", "db.pool_size", 5)?,
                max_overflow: optional_parsed("CONSULTEASE_DB_MAX_OVERFLOW", "db.max_overflow", 10)?,
                health_interval: Duration::from_secs(optional_parsed(
                    "CONSULTEASE_DB_HEALTH_INTERVAL_SEC",
                    "db.health_interval_sec",
                    120,
                )?),
                restart_cooldown: Duration::from_secs(optional_parsed(
                    "CONSULTEASE_DB_RESTART_COOLDOWN_SEC",
                    "db.restart_cooldown_sec",
                    600,
                )?),
            },
            mqtt: MqttConfig {
                broker_host: required_str("CONSULTEASE_MQTT_BROKER_HOST", "mqtt.broker_host")?,
                broker_port: required_parsed("CONSULTEASE_MQTT_BROKER_PORT", "mqtt.broker_port")?,
                username: env::var("CONSULTEASE_MQTT_USERNAME").ok(),
                password: env::var("CONSULTEASE_MQTT_PASSWORD").ok(),
                batch_size: optional_parsed("CONSULTEASE_MQTT_BATCH_SIZE", "mqtt.batch_size", 10)?,
                batch_timeout: Duration::from_millis(optional_parsed(
                    "CONSULTEASE_MQTT_BATCH_TIMEOUT_MS",
                    "mqtt.batch_timeout_ms",
                    100,
                )?),
                offline_queue_size: optional_parsed(
                    "CONSULTEASE_MQTT_OFFLINE_QUEUE_SIZE",
                    "mqtt.offline_queue_size",
                    20,
                )?,
            },
            consultation: ConsultationConfig {
                expiry: Duration::from_secs(optional_parsed(
                    "CONSULTEASE_CONSULTATION_EXPIRY_SEC",
                    "consultation.expiry_sec",
                    300,
                )?),
                sweep_interval: Duration::from_secs(optional_parsed(
                    "CONSULTEASE_CONSULTATION_SWEEP_INTERVAL_SEC",
                    "consultation.sweep_interval_sec",
                    60,
                )?),
            },
            service: ServiceConfig {
                restart_budget: optional_parsed("CONSULTEASE_SERVICE_RESTART_BUDGET", "service.restart_budget", 5)?,
            },
        })
    }
}

fn required_str(env_key: &'static str, spec_key: &'static str) -> Result<String, ConfigError> {
    env::var(env_key).map_err(|_| ConfigError::MissingRequired(spec_key))
}

fn required_parsed<T>(env_key: &'static str, spec_key: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = required_str(env_key, spec_key)?;
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: spec_key,
        value: raw,
        reason: e.to_string(),
    })
}

fn optional_parsed<T>(env_key: &'static str, spec_key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(env_key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: spec_key,
            value: raw,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that
    // touch them so parallel test threads don't race.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_consultease_env() {
        for (key, _) in env::vars() {
            if key.starts_with("CONSULTEASE_") {
                env::remove_var(key);
            }
        }
    }

    #[test]
    fn missing_required_key_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_consultease_env();
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::MissingRequired("db.url"))));
    }

    #[test]
    fn defaults_applied_when_optional_keys_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_consultease_env();
        env::set_var("CONSULTEASE_DB_URL", "file:local.db");
        env::set_var("CONSULTEASE_MQTT_BROKER_HOST", "localhost");
        env::set_var("CONSULTEASE_MQTT_BROKER_PORT", "1883");

        let config = Config::from_env().unwrap();
        assert_eq!(config.db.pool_size, 5);
        assert_eq!(config.db.health_interval, Duration::from_secs(120));
        assert_eq!(config.mqtt.batch_size, 10);
        assert_eq!(config.consultation.expiry, Duration::from_secs(300));
        clear_consultease_env();
    }

    #[test]
    fn invalid_value_is_reported_with_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_consultease_env();
        env::set_var("CONSULTEASE_DB_URL", "file:local.db");
        env::set_var("CONSULTEASE_MQTT_BROKER_HOST", "localhost");
        env::set_var("CONSULTEASE_MQTT_BROKER_PORT", "not-a-port");

        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue { key: "mqtt.broker_port", .. })));
        clear_consultease_env();
    }
}
