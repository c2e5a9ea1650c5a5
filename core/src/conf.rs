use std::env;
use std::path::PathBuf;

/// Process-level knobs that are not part of the four config-store tables.
/// Read once at startup; panics (via `.expect`) if a malformed value is
/// supplied.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub tick_interval_secs: u64,
    pub base_dir: PathBuf,
    pub tick_watchdog_secs: u64,
    pub db_op_timeout_secs: u64,
    pub config_db_path: PathBuf,
    pub sync_parameters_path: PathBuf,
    pub log_file: Option<String>,
}

impl ProcessSettings {
    pub fn init() -> Self {
        let tick_interval_secs = env::var("TICK_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .expect("TICK_INTERVAL_SECS must be a positive integer");

        let base_dir = env::var("BASE_DIR").unwrap_or_else(|_| "./sitesync-data".to_string());

        let tick_watchdog_secs = env::var("TICK_WATCHDOG_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse::<u64>()
            .expect("TICK_WATCHDOG_SECS must be a positive integer");

        let db_op_timeout_secs = env::var("DB_OP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .expect("DB_OP_TIMEOUT_SECS must be a positive integer");

        let config_db_path = env::var("CONFIG_DB_PATH")
            .unwrap_or_else(|_| "./sitesync-config.sqlite3".to_string());

        let sync_parameters_path = env::var("SYNC_PARAMETERS_PATH")
            .unwrap_or_else(|_| "./sync_parameters.yaml".to_string());

        let log_file = env::var("LOG_FILE").ok();

        Self {
            tick_interval_secs,
            base_dir: PathBuf::from(base_dir),
            tick_watchdog_secs,
            db_op_timeout_secs,
            config_db_path: PathBuf::from(config_db_path),
            sync_parameters_path: PathBuf::from(sync_parameters_path),
            log_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        for key in [
            "TICK_INTERVAL_SECS",
            "BASE_DIR",
            "TICK_WATCHDOG_SECS",
            "DB_OP_TIMEOUT_SECS",
            "CONFIG_DB_PATH",
            "SYNC_PARAMETERS_PATH",
            "LOG_FILE",
        ] {
            env::remove_var(key);
        }
        let settings = ProcessSettings::init();
        assert_eq!(settings.tick_interval_secs, 60);
        assert_eq!(settings.base_dir, PathBuf::from("./sitesync-data"));
        assert_eq!(settings.tick_watchdog_secs, 600);
        assert_eq!(settings.db_op_timeout_secs, 30);
        assert!(settings.log_file.is_none());
    }
}
