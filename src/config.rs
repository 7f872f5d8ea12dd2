use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub cricscore_api_url: String,
    pub scorewave_api_url: String,
    pub sweeps: SweepConfig,
}

/// Sweep cadences and grace windows, all env-overridable
#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    /// Result sweep cadence (seconds)
    pub result_interval_secs: u64,
    /// Stale fancy-market sweep cadence (seconds)
    pub fancy_interval_secs: u64,
    /// Stale match sweep cadence (seconds)
    pub stale_interval_secs: u64,
    /// Grace window before an unsettled fancy market is voided (minutes)
    pub fancy_grace_minutes: i64,
    /// Grace window before an unresolved match has its bets voided (minutes)
    pub match_grace_minutes: i64,
    /// Age past which an unresolved match is flagged in logs (minutes)
    pub ancient_threshold_minutes: i64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            result_interval_secs: 120,
            fancy_interval_secs: 600,
            stale_interval_secs: 900,
            fancy_grace_minutes: 30,
            match_grace_minutes: 60,
            ancient_threshold_minutes: 1440,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let defaults = SweepConfig::default();
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/crickbet".to_string()),
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            cricscore_api_url: std::env::var("CRICSCORE_API_URL")
                .unwrap_or_else(|_| "https://api.cricscore.example.com".to_string()),
            scorewave_api_url: std::env::var("SCOREWAVE_API_URL")
                .unwrap_or_else(|_| "https://scorewave.example.com/v2".to_string()),
            sweeps: SweepConfig {
                result_interval_secs: env_parsed(
                    "RESULT_SWEEP_INTERVAL_SECS",
                    defaults.result_interval_secs,
                ),
                fancy_interval_secs: env_parsed(
                    "FANCY_SWEEP_INTERVAL_SECS",
                    defaults.fancy_interval_secs,
                ),
                stale_interval_secs: env_parsed(
                    "STALE_SWEEP_INTERVAL_SECS",
                    defaults.stale_interval_secs,
                ),
                fancy_grace_minutes: env_parsed(
                    "FANCY_GRACE_MINUTES",
                    defaults.fancy_grace_minutes,
                ),
                match_grace_minutes: env_parsed(
                    "MATCH_GRACE_MINUTES",
                    defaults.match_grace_minutes,
                ),
                ancient_threshold_minutes: env_parsed(
                    "ANCIENT_THRESHOLD_MINUTES",
                    defaults.ancient_threshold_minutes,
                ),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_defaults() {
        let sweeps = SweepConfig::default();
        assert!(sweeps.result_interval_secs < sweeps.fancy_interval_secs);
        assert!(sweeps.fancy_interval_secs < sweeps.stale_interval_secs);
        assert!(sweeps.fancy_grace_minutes < sweeps.match_grace_minutes);
    }
}
