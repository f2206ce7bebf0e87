use env_logger::{Builder, Env};

/// Log filter variable consulted before the default `info` level.
const LOG_FILTER_ENV: &str = "CONNECTOR_LOG";

pub fn init() {
	let env = Env::default()
		.filter_or(LOG_FILTER_ENV, "info")
		.write_style("CONNECTOR_LOG_STYLE");

	// A second init (e.g. from an embedding harness) keeps the first logger.
	let _ = Builder::from_env(env)
		.format_timestamp_millis()
		.format_module_path(true)
		.try_init();
}
