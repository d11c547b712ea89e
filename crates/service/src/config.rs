//! Process configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use domain::TransitionPolicy;
use messaging::BrokerConfig;
use orders::OrderServiceConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` / `PORT`: health and metrics listener (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: PostgreSQL stores when set, in-memory stores otherwise
/// - `EXCHANGE_NAME`: topic exchange name (default `order-exchange`)
/// - `CONSUMER_CONCURRENCY`: workers per consumer (default 4)
/// - `MAX_DELIVERIES`, `REDELIVERY_DELAY_MS`: redelivery limits
/// - `OUTBOX_POLL_INTERVAL_MS`: outbox relay period (default 500)
/// - `GUARD_TRANSITIONS`: reject out-of-order status changes (default false)
/// - `DEDUPLICATE_RESERVATIONS`: reserve each order once (default true)
/// - `PAYMENT_METHOD`, `CARRIER`: tags stamped on paid and shipped events
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub exchange: String,
    pub consumer_concurrency: usize,
    pub max_deliveries: u32,
    pub redelivery_delay: Duration,
    pub outbox_poll_interval: Duration,
    pub guard_transitions: bool,
    pub deduplicate_reservations: bool,
    pub payment_method: String,
    pub carrier: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            parse_var(&lookup, key)
                .map(Duration::from_millis)
                .unwrap_or(default)
        };
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| parse_flag(&v))
                .unwrap_or(default)
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            exchange: lookup("EXCHANGE_NAME").unwrap_or(defaults.exchange),
            consumer_concurrency: parse_var(&lookup, "CONSUMER_CONCURRENCY")
                .unwrap_or(defaults.consumer_concurrency),
            max_deliveries: parse_var(&lookup, "MAX_DELIVERIES").unwrap_or(defaults.max_deliveries),
            redelivery_delay: millis("REDELIVERY_DELAY_MS", defaults.redelivery_delay),
            outbox_poll_interval: millis("OUTBOX_POLL_INTERVAL_MS", defaults.outbox_poll_interval),
            guard_transitions: flag("GUARD_TRANSITIONS", defaults.guard_transitions),
            deduplicate_reservations: flag(
                "DEDUPLICATE_RESERVATIONS",
                defaults.deduplicate_reservations,
            ),
            payment_method: lookup("PAYMENT_METHOD").unwrap_or(defaults.payment_method),
            carrier: lookup("CARRIER").unwrap_or(defaults.carrier),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn order_service_config(&self) -> OrderServiceConfig {
        OrderServiceConfig {
            transition_policy: if self.guard_transitions {
                TransitionPolicy::Guarded
            } else {
                TransitionPolicy::Unguarded
            },
            payment_method: self.payment_method.clone(),
            carrier: self.carrier.clone(),
        }
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig {
            exchange: self.exchange.clone(),
            max_deliveries: self.max_deliveries.max(1),
            redelivery_delay: self.redelivery_delay,
            ..BrokerConfig::default()
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            exchange: "order-exchange".to_string(),
            consumer_concurrency: 4,
            max_deliveries: 5,
            redelivery_delay: Duration::from_millis(200),
            outbox_poll_interval: Duration::from_millis(500),
            guard_transitions: false,
            deduplicate_reservations: true,
            payment_method: "CREDIT_CARD".to_string(),
            carrier: "UPS".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.database_url, None);
        assert_eq!(config.exchange, "order-exchange");
        assert_eq!(config.consumer_concurrency, 4);
        assert_eq!(config.max_deliveries, 5);
        assert_eq!(config.redelivery_delay, Duration::from_millis(200));
        assert_eq!(config.outbox_poll_interval, Duration::from_millis(500));
        assert!(!config.guard_transitions);
        assert!(config.deduplicate_reservations);
        assert_eq!(config.payment_method, "CREDIT_CARD");
        assert_eq!(config.carrier, "UPS");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("CONSUMER_CONCURRENCY", "8"),
            ("REDELIVERY_DELAY_MS", "50"),
            ("GUARD_TRANSITIONS", "true"),
            ("DEDUPLICATE_RESERVATIONS", "0"),
            ("CARRIER", "DHL"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/orders")
        );
        assert_eq!(config.consumer_concurrency, 8);
        assert_eq!(config.redelivery_delay, Duration::from_millis(50));
        assert!(config.guard_transitions);
        assert!(!config.deduplicate_reservations);
        assert_eq!(config.order_service_config().carrier, "DHL");
        assert_eq!(
            config.order_service_config().transition_policy,
            TransitionPolicy::Guarded
        );
    }

    #[test]
    fn test_unparseable_values_use_defaults() {
        let config = from_pairs(&[
            ("PORT", "not-a-port"),
            ("MAX_DELIVERIES", "-1"),
            ("GUARD_TRANSITIONS", "maybe"),
            ("DATABASE_URL", "  "),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_deliveries, 5);
        assert!(!config.guard_transitions);
        assert_eq!(config.database_url, None);
    }

    #[test]
    fn test_broker_config() {
        let config = from_pairs(&[("EXCHANGE_NAME", "orders"), ("MAX_DELIVERIES", "0")]);
        let broker = config.broker_config();
        assert_eq!(broker.exchange, "orders");
        assert_eq!(broker.max_deliveries, 1);
    }
}
