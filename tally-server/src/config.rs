//! Server configuration, loaded from environment variables at startup.

use tally_core::GrantConfig;

/// Runtime configuration for tally-server.
///
/// Every field has a default, so the server starts without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://tally.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins.  `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Serve the OpenAPI document at `/api-docs/openapi.json`.
    pub enable_docs: bool,

    /// Credits added per auto-grant.
    pub grant_amount: i64,

    /// Days between grants to the same user.
    pub grant_frequency_days: i64,

    /// Minutes between scheduler ticks.
    pub grant_check_interval_minutes: i64,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build [`Config`] from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        Self {
            bind_address: env_or("TALLY_BIND", "0.0.0.0:3000"),
            database_url: env_or("TALLY_DATABASE_URL", "sqlite://tally.db"),
            log_level: env_or("TALLY_LOG", "info"),
            log_json: lookup("TALLY_LOG_JSON").is_some_and(|v| parse_flag(&v)),
            cors_allowed_origins: lookup("TALLY_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_docs: lookup("TALLY_ENABLE_DOCS").is_none_or(|v| parse_flag(&v)),
            grant_amount: parse_or(lookup("TALLY_GRANT_AMOUNT"), 10),
            grant_frequency_days: parse_or(lookup("TALLY_GRANT_FREQUENCY_DAYS"), 1),
            grant_check_interval_minutes: parse_or(
                lookup("TALLY_GRANT_CHECK_INTERVAL_MINUTES"),
                5,
            ),
        }
    }

    /// Scheduler settings; out-of-range values are clamped there.
    pub fn grant_config(&self) -> GrantConfig {
        GrantConfig::new(
            self.grant_amount,
            self.grant_frequency_days,
            self.grant_check_interval_minutes,
        )
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_flag(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_without_variables() {
        let cfg = config_from(&[]);
        assert_eq!(cfg.bind_address, "0.0.0.0:3000");
        assert_eq!(cfg.database_url, "sqlite://tally.db");
        assert!(!cfg.log_json);
        assert!(cfg.enable_docs);
        assert_eq!(cfg.cors_allowed_origins, None);
        assert_eq!(
            (cfg.grant_amount, cfg.grant_frequency_days, cfg.grant_check_interval_minutes),
            (10, 1, 5)
        );
    }

    #[test]
    fn unparseable_numbers_fall_back() {
        let cfg = config_from(&[("TALLY_GRANT_AMOUNT", "lots"), ("TALLY_GRANT_FREQUENCY_DAYS", " 7 ")]);
        assert_eq!(cfg.grant_amount, 10);
        assert_eq!(cfg.grant_frequency_days, 7);
    }

    #[test]
    fn flags_accept_one_and_true() {
        let cfg = config_from(&[("TALLY_LOG_JSON", "TRUE"), ("TALLY_ENABLE_DOCS", "0")]);
        assert!(cfg.log_json);
        assert!(!cfg.enable_docs);
    }

    #[test]
    fn zero_frequency_is_clamped_in_grant_config() {
        let cfg = config_from(&[("TALLY_GRANT_FREQUENCY_DAYS", "0")]);
        assert_eq!(cfg.grant_config().grant_frequency(), chrono::Duration::days(1));
    }

    #[test]
    fn maximal_frequency_does_not_panic() {
        let cfg = config_from(&[("TALLY_GRANT_FREQUENCY_DAYS", &i64::MAX.to_string())]);
        assert_eq!(
            cfg.grant_config().grant_frequency(),
            chrono::Duration::days(tally_core::scheduler::MAX_FREQUENCY_DAYS)
        );
    }
}
