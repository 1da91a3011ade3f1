use coachline_core::notification::Channel;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_lead_hours")]
    pub cancellation_lead_hours: i64,
    #[serde(default = "default_max_seats")]
    pub max_seats_per_booking: usize,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: i64,
    /// How long a seat claim may stay held without its booking row.
    #[serde(default = "default_claim_ttl")]
    pub seat_claim_ttl_seconds: i64,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            cancellation_lead_hours: default_lead_hours(),
            max_seats_per_booking: default_max_seats(),
            rate_limit_per_minute: default_rate_limit(),
            seat_claim_ttl_seconds: default_claim_ttl(),
        }
    }
}

fn default_lead_hours() -> i64 { 2 }
fn default_max_seats() -> usize { 6 }
fn default_rate_limit() -> i64 { 100 }
fn default_claim_ttl() -> i64 { crate::seat_claim_repo::DEFAULT_CLAIM_TTL_SECONDS }

/// Channel strings as stored in config, e.g. `["EMAIL", "IN_APP"]`.
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    #[serde(default = "default_booking_channels")]
    pub booking_channels: Vec<Channel>,
    #[serde(default = "default_cancellation_channels")]
    pub cancellation_channels: Vec<Channel>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            booking_channels: default_booking_channels(),
            cancellation_channels: default_cancellation_channels(),
        }
    }
}

fn default_booking_channels() -> Vec<Channel> {
    vec![Channel::Email, Channel::Push, Channel::Sms, Channel::InApp]
}

fn default_cancellation_channels() -> Vec<Channel> {
    vec![Channel::Email, Channel::Push, Channel::InApp]
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides, optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `COACHLINE__DATABASE__URL=...`
            .add_source(config::Environment::with_prefix("COACHLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rules_default_when_section_missing() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080
                [database]
                url = "postgres://localhost/coachline"
                [auth]
                jwt_secret = "secret"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let cfg: Config = s.try_deserialize().unwrap();
        assert_eq!(cfg.business_rules.cancellation_lead_hours, 2);
        assert_eq!(cfg.business_rules.max_seats_per_booking, 6);
        assert_eq!(cfg.business_rules.seat_claim_ttl_seconds, 300);
        assert!(cfg.redis.is_none());
        assert!(cfg.kafka.is_none());
        assert_eq!(cfg.notifications.cancellation_channels.len(), 3);
    }

    #[test]
    fn channel_lists_parse_from_strings() {
        let s = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 8080
                [database]
                url = "postgres://localhost/coachline"
                [auth]
                jwt_secret = "secret"
                [notifications]
                booking_channels = ["IN_APP", "SMS"]
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let cfg: Config = s.try_deserialize().unwrap();
        assert_eq!(cfg.notifications.booking_channels, vec![Channel::InApp, Channel::Sms]);
    }
}
