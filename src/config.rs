// src/config.rs

use crate::error::{StepError, StepResult};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_PAGE_SIZE: u32 = 1000;

/// Instance configuration for one connector run.
#[derive(Debug, Clone)]
pub struct IntegrationConfig {
	pub api_base_url: String,
	pub api_token: String,
	pub account_id: String,
	pub account_name: String,
	pub page_size: u32,
	pub request_delay: Duration,
	pub database_path: PathBuf,
	/// Keep job state in memory instead of writing the SQLite database.
	pub dry_run: bool,
}

impl IntegrationConfig {
	/// Loads the configuration from process environment variables.
	pub fn from_env() -> StepResult<Self> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads the configuration through an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> StepResult<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let required = |key: &str| -> StepResult<String> {
			lookup(key)
				.map(|v| v.trim().to_string())
				.filter(|v| !v.is_empty())
				.ok_or_else(|| StepError::Config(format!("{} must be set", key)))
		};

		let api_base_url = required("CVE_API_BASE_URL")?;
		let api_token = required("CVE_API_TOKEN")?;
		let account_id = required("CVE_ACCOUNT_ID")?;
		let account_name = lookup("CVE_ACCOUNT_NAME")
			.map(|v| v.trim().to_string())
			.filter(|v| !v.is_empty())
			.unwrap_or_else(|| account_id.clone());

		let page_size = match lookup("CVE_PAGE_SIZE") {
			Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
				StepError::Config(format!("CVE_PAGE_SIZE is not a number: '{}'", raw))
			})?,
			None => DEFAULT_PAGE_SIZE,
		};

		let request_delay = match lookup("CVE_REQUEST_DELAY_MS") {
			Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().map_err(|_| {
				StepError::Config(format!("CVE_REQUEST_DELAY_MS is not a number: '{}'", raw))
			})?),
			None => Duration::ZERO,
		};

		let database_path = lookup("JOB_STATE_DB")
			.map(PathBuf::from)
			.unwrap_or_else(default_database_path);

		let dry_run = match lookup("CONNECTOR_DRY_RUN").map(|v| v.trim().to_lowercase()) {
			None => false,
			Some(v) if v.is_empty() || v == "0" || v == "false" => false,
			Some(v) if v == "1" || v == "true" => true,
			Some(v) => {
				return Err(StepError::Config(format!("CONNECTOR_DRY_RUN must be true or false, got '{}'", v)));
			}
		};

		let config = Self {
			api_base_url: api_base_url.trim_end_matches('/').to_string(),
			api_token,
			account_id,
			account_name,
			page_size,
			request_delay,
			database_path,
			dry_run,
		};
		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> StepResult<()> {
		if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
			return Err(StepError::Config(format!(
				"CVE_API_BASE_URL must be an http(s) URL, got '{}'",
				self.api_base_url
			)));
		}
		if self.api_token.is_empty() || self.account_id.is_empty() {
			return Err(StepError::Config("API token and account id are required".to_string()));
		}
		if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
			return Err(StepError::Config(format!(
				"CVE_PAGE_SIZE must be between 1 and {}, got {}",
				MAX_PAGE_SIZE, self.page_size
			)));
		}
		Ok(())
	}
}

fn default_database_path() -> PathBuf {
	let mut db_path = PathBuf::from(".");
	db_path.push("database");
	db_path.push("job_state.db");
	db_path
}

#[cfg(test)]
pub(crate) fn test_config() -> IntegrationConfig {
	IntegrationConfig {
		api_base_url: "https://api.example.test".to_string(),
		api_token: "token".to_string(),
		account_id: "acme".to_string(),
		account_name: "Acme Corp".to_string(),
		page_size: 50,
		request_delay: Duration::ZERO,
		database_path: PathBuf::from("unused.db"),
		dry_run: true,
	}
}
