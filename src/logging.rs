use crate::config::PortalConfig;

/// Route `log` output to stderr; stdout carries the IPC channel and must stay clean.
pub fn init(config: &PortalConfig) {
    let _ = env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .target(env_logger::Target::Stderr)
        .format_timestamp_millis()
        .try_init();
}
