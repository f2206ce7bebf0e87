// src/main.rs

mod config;
mod db;
mod error;
mod models;
mod repositories;
mod steps;
mod utils;

use anyhow::{Context, Result};
use config::IntegrationConfig;
use db::connection::{self, SqlitePool};
use log::{error, info, warn};
use repositories::job_state::JobState;
use repositories::memory_job_state::MemoryJobState;
use repositories::sqlite_job_state::SqliteJobState;
use std::sync::Arc;
use steps::{StepContext, integration_steps, run_steps};
use tokio::signal;

struct App {
	config: IntegrationConfig,
	pool: Option<Arc<SqlitePool>>,
}

impl App {
	fn new() -> Result<Self> {
		utils::logger::init();
		info!("Starting CVE findings connector");

		let config = IntegrationConfig::from_env().context("Failed to load integration configuration")?;
		info!(
			"Ingesting findings for account '{}' from {}",
			config.account_id, config.api_base_url
		);

		let pool = if config.dry_run {
			info!("Dry run: job state is kept in memory");
			None
		} else {
			Some(Arc::new(
				connection::establish_pool_with_path(&config.database_path)
					.context("Failed to establish database connection pool")?,
			))
		};

		Ok(App { config, pool })
	}

	fn job_state(&self) -> Result<Arc<dyn JobState>> {
		match &self.pool {
			Some(pool) => {
				let store = SqliteJobState::for_new_run(pool.clone())
					.context("Failed to prepare job state database")?;
				Ok(Arc::new(store))
			}
			None => Ok(Arc::new(MemoryJobState::new())),
		}
	}

	async fn run(&self) -> Result<()> {
		let job_state = self.job_state()?;

		let integration = integration_steps(&self.config).context("Failed to build integration steps")?;
		let context = StepContext {
			config: self.config.clone(),
			job_state: job_state.clone(),
		};

		tokio::select! {
			result = run_steps(&integration, &context) => {
				result.context("Integration run failed")?;
				let findings = job_state
					.entity_count_by_type(steps::constants::entities::FINDING_TYPE)
					.await?;
				info!("Integration run completed; job state holds {} findings", findings);
			}
			// A failed signal listener disables this branch instead of aborting.
			Ok(()) = signal::ctrl_c() => {
				warn!("Received Ctrl+C signal, aborting run");
				anyhow::bail!("Integration run interrupted");
			}
		}

		Ok(())
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	let app = App::new()?;
	if let Err(e) = app.run().await {
		error!("{:#}", e);
		return Err(e);
	}
	Ok(())
}
