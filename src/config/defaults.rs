use super::*;

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: DEFAULT_PORT,
            device_id: String::new(),
            timeout_ms: 5000,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            handshake_pause_ms: 100,
            handshake_drain_ms: 1000,
            handshake_settle_ms: 200,
            read_timeout_ms: 2000,
            command_settle_ms: 500,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            use_cache: true,
            interval_ms: 2000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            file: String::new(),
            console_output: true,
            json_format: false,
            backup_count: 5,
        }
    }
}
