use rusqlite::Connection;
use anyhow::{Result, Context};

pub fn create_tables(conn: &Connection) -> Result<()> {
	conn.execute_batch(
		"
		CREATE TABLE IF NOT EXISTS job_data (
			key TEXT PRIMARY KEY,
			value TEXT NOT NULL
		);

		CREATE TABLE IF NOT EXISTS entities (
			key TEXT PRIMARY KEY,
			entity_type TEXT NOT NULL,
			class TEXT NOT NULL,
			display_name TEXT NOT NULL,
			properties TEXT NOT NULL
		);

		CREATE INDEX IF NOT EXISTS idx_entities_type
		ON entities(entity_type);

		CREATE TABLE IF NOT EXISTS relationships (
			key TEXT PRIMARY KEY,
			relationship_type TEXT NOT NULL,
			class TEXT NOT NULL,
			from_key TEXT NOT NULL,
			target TEXT NOT NULL
		);

		CREATE INDEX IF NOT EXISTS idx_relationships_type
		ON relationships(relationship_type);
		"
	).context("Failed to create tables")?;

	Ok(())
}

/// Empties the job state tables so a run starts from nothing.
pub fn clear_job_state(conn: &mut Connection) -> Result<()> {
	let tx = conn.transaction().context("Failed to start transaction")?;
	tx.execute_batch(
		"
		DELETE FROM relationships;
		DELETE FROM entities;
		DELETE FROM job_data;
		"
	).context("Failed to clear job state")?;
	tx.commit().context("Failed to commit job state reset")?;

	Ok(())
}
