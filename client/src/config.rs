use std::env;
use std::time::Duration;

pub const DEFAULT_CONVERTER_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
/// ~5 minutos a intervalo normal
pub const DEFAULT_MAX_RETRIES: u32 = 300;

/// URL base del convertidor.
/// - En Docker: CONVERTER_URL=http://web:8000
/// - Local: default http://localhost:8000
pub fn converter_base_url() -> String {
    env::var("CONVERTER_URL")
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|_| DEFAULT_CONVERTER_URL.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

/// Parámetros del poller: intervalo base y presupuesto de reintentos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_retries: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl PollConfig {
    /// Lee POLL_INTERVAL_MS y POLL_MAX_RETRIES; valores ausentes o inválidos
    /// caen al default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            interval: env_parse::<u64>("POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.interval),
            max_retries: env_parse::<u32>("POLL_MAX_RETRIES").unwrap_or(defaults.max_retries),
        }
    }

    /// Aplica overrides de la línea de comandos encima de lo que vino del entorno.
    pub fn with_overrides(mut self, interval_ms: Option<u64>, max_retries: Option<u32>) -> Self {
        if let Some(ms) = interval_ms {
            self.interval = Duration::from_millis(ms);
        }
        if let Some(n) = max_retries {
            self.max_retries = n;
        }
        self
    }
}
