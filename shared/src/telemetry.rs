use anyhow::Result;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_filter: String,
    pub json_logs: bool,
}

impl TelemetryConfig {
    pub fn from_env(service_name: &str) -> Self {
        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        let json_logs = std::env::var("LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        Self {
            service_name: service_name.to_string(),
            log_filter,
            json_logs,
        }
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays free for
/// command output.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    debug!("Telemetry initialized for {}", config.service_name);
    Ok(())
}
