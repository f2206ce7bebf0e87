use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use anyhow::{Result, Context};
use log::info;

pub type SqlitePool = Pool<SqliteConnectionManager>;

const MAX_POOL_SIZE: u32 = 8;
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Establishes a connection pool for the job state database at `path`
pub fn establish_pool_with_path(path: &Path) -> Result<SqlitePool> {
	info!("Job state database will be located at: {:?}", path);

	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		std::fs::create_dir_all(parent)
			.context("Failed to create database directory")?;
	}

	let manager = SqliteConnectionManager::file(path)
		.with_init(|conn| conn.execute_batch(&format!("PRAGMA busy_timeout = {};", BUSY_TIMEOUT_MS)));

	let pool = Pool::builder()
		.max_size(MAX_POOL_SIZE)
		.build(manager)
		.context("Failed to create SQLite connection pool")?;

	info!("SQLite connection pool established successfully");
	Ok(pool)
}
