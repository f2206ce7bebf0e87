// src/repositories/sqlite_job_state.rs

use crate::db::connection::SqlitePool;
use crate::db::schema;
use crate::models::entity::{Entity, Relationship, RelationshipTarget};
use crate::repositories::job_state::JobState;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::info;
use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::task;

/// [`JobState`] persisted in SQLite so other tools can read what the last
/// run produced.
pub struct SqliteJobState {
	pool: Arc<SqlitePool>,
}

impl SqliteJobState {
	pub fn new(pool: Arc<SqlitePool>) -> Self {
		Self { pool }
	}

	/// Creates the tables if needed and drops whatever an earlier run left.
	///
	/// Keys are only unique within one run; reusing old rows would make
	/// every finding of a repeated run look like a duplicate.
	pub fn for_new_run(pool: Arc<SqlitePool>) -> Result<Self> {
		let mut conn = pool.get().context("Failed to get database connection")?;
		schema::create_tables(&conn).context("Failed to create database tables")?;
		schema::clear_job_state(&mut conn)?;
		drop(conn);

		info!("Job state tables initialized for a new run");
		Ok(Self::new(pool))
	}
}

fn insert_relationship(conn: &rusqlite::Connection, relationship: &Relationship) -> Result<()> {
	let target = serde_json::to_string(&relationship.to)
		.context("Failed to serialize relationship target")?;

	let result = conn.execute(
		"INSERT INTO relationships (key, relationship_type, class, from_key, target)
		 VALUES (?1, ?2, ?3, ?4, ?5)",
		params![
			relationship.key,
			relationship.relationship_type,
			relationship.class,
			relationship.from_key,
			target,
		],
	).with_context(|| format!("Failed to insert relationship {}", relationship.key))?;

	if result != 1 {
		return Err(anyhow!("Failed to insert relationship {}: unexpected row count", relationship.key));
	}
	Ok(())
}

#[async_trait]
impl JobState for SqliteJobState {
	async fn set_data(&self, key: &str, value: Value) -> Result<()> {
		let pool = self.pool.clone();
		let key = key.to_string();

		task::spawn_blocking(move || -> Result<()> {
			let conn = pool.get().context("Failed to get database connection")?;
			conn.execute(
				"INSERT INTO job_data (key, value) VALUES (?1, ?2)
				 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
				params![key, value.to_string()],
			).context("Failed to store job data")?;
			Ok(())
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn get_data(&self, key: &str) -> Result<Option<Value>> {
		let pool = self.pool.clone();
		let key = key.to_string();

		task::spawn_blocking(move || -> Result<_> {
			let conn = pool.get().context("Failed to get database connection")?;
			let raw: Option<String> = conn
				.query_row("SELECT value FROM job_data WHERE key = ?1", [&key], |row| row.get(0))
				.optional()
				.context("Failed to read job data")?;

			raw.map(|s| serde_json::from_str::<Value>(&s).context("Failed to parse stored job data"))
				.transpose()
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn has_key(&self, key: &str) -> Result<bool> {
		let pool = self.pool.clone();
		let key = key.to_string();

		task::spawn_blocking(move || -> Result<bool> {
			let conn = pool.get().context("Failed to get database connection")?;
			let exists: bool = conn.query_row(
				"SELECT EXISTS(SELECT 1 FROM entities WHERE key = ?1)
				     OR EXISTS(SELECT 1 FROM relationships WHERE key = ?1)",
				[&key],
				|row| row.get(0),
			).context("Failed to check key")?;
			Ok(exists)
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn find_entity(&self, key: &str) -> Result<Option<Entity>> {
		let pool = self.pool.clone();
		let key = key.to_string();

		task::spawn_blocking(move || -> Result<_> {
			let conn = pool.get().context("Failed to get database connection")?;
			let row = conn
				.query_row(
					"SELECT key, entity_type, class, display_name, properties
					 FROM entities WHERE key = ?1",
					[&key],
					|row| {
						Ok((
							row.get::<_, String>(0)?,
							row.get::<_, String>(1)?,
							row.get::<_, String>(2)?,
							row.get::<_, String>(3)?,
							row.get::<_, String>(4)?,
						))
					},
				)
				.optional()
				.context("Failed to look up entity")?;

			match row {
				Some((key, entity_type, class, display_name, properties)) => {
					let properties: Map<String, Value> = serde_json::from_str(&properties)
						.with_context(|| format!("Failed to parse properties of entity {}", key))?;
					Ok(Some(Entity { key, entity_type, class, display_name, properties }))
				}
				None => Ok(None),
			}
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn add_entity(&self, entity: Entity) -> Result<()> {
		let pool = self.pool.clone();

		task::spawn_blocking(move || -> Result<()> {
			let conn = pool.get().context("Failed to get database connection")?;
			let properties = serde_json::to_string(&entity.properties)
				.context("Failed to serialize entity properties")?;

			let result = conn.execute(
				"INSERT INTO entities (key, entity_type, class, display_name, properties)
				 VALUES (?1, ?2, ?3, ?4, ?5)",
				params![
					entity.key,
					entity.entity_type,
					entity.class,
					entity.display_name,
					properties,
				],
			).with_context(|| format!("Failed to insert entity {}", entity.key))?;

			if result != 1 {
				return Err(anyhow!("Failed to insert entity {}: unexpected row count", entity.key));
			}
			Ok(())
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn add_relationship(&self, relationship: Relationship) -> Result<()> {
		let pool = self.pool.clone();

		task::spawn_blocking(move || -> Result<()> {
			let conn = pool.get().context("Failed to get database connection")?;
			insert_relationship(&conn, &relationship)
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()> {
		let pool = self.pool.clone();

		task::spawn_blocking(move || -> Result<()> {
			let mut conn = pool.get().context("Failed to get database connection")?;
			let tx = conn.transaction()?;

			for relationship in &relationships {
				insert_relationship(&tx, relationship)?;
			}

			tx.commit().context("Failed to commit transaction")?;
			Ok(())
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn entity_count_by_type(&self, entity_type: &str) -> Result<usize> {
		let pool = self.pool.clone();
		let entity_type = entity_type.to_string();

		task::spawn_blocking(move || -> Result<usize> {
			let conn = pool.get().context("Failed to get database connection")?;
			let count: i64 = conn.query_row(
				"SELECT COUNT(*) FROM entities WHERE entity_type = ?1",
				[&entity_type],
				|row| row.get(0),
			).context("Failed to count entities")?;
			usize::try_from(count).context("Entity count out of range")
		})
			.await
			.context("Failed to execute database operation")?
	}

	async fn relationships_by_type(&self, relationship_type: &str) -> Result<Vec<Relationship>> {
		let pool = self.pool.clone();
		let relationship_type = relationship_type.to_string();

		task::spawn_blocking(move || -> Result<_> {
			let conn = pool.get().context("Failed to get database connection")?;
			let mut stmt = conn.prepare(
				"SELECT key, relationship_type, class, from_key, target
				 FROM relationships
				 WHERE relationship_type = ?1
				 ORDER BY rowid"
			).context("Failed to prepare statement")?;

			let rows = stmt.query_map([&relationship_type], |row| {
				Ok((
					row.get::<_, String>(0)?,
					row.get::<_, String>(1)?,
					row.get::<_, String>(2)?,
					row.get::<_, String>(3)?,
					row.get::<_, String>(4)?,
				))
			})?;

			let mut relationships = Vec::new();
			for row in rows {
				let (key, relationship_type, class, from_key, target) = row?;
				let to: RelationshipTarget = serde_json::from_str(&target)
					.with_context(|| format!("Failed to parse target of relationship {}", key))?;
				relationships.push(Relationship { key, relationship_type, class, from_key, to });
			}
			Ok(relationships)
		})
			.await
			.context("Failed to execute database operation")?
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::db::connection;
	use serde_json::json;
	use tempfile::{tempdir, TempDir};

	async fn setup_test_db() -> Result<(TempDir, SqliteJobState)> {
		let dir = tempdir()?;
		let db_path = dir.path().join("test.db");
		let pool = Arc::new(connection::establish_pool_with_path(&db_path)?);

		let conn = pool.get()?;
		crate::db::schema::create_tables(&conn)?;

		Ok((dir, SqliteJobState::new(pool)))
	}

	#[tokio::test]
	async fn test_entity_and_data_round_trip() -> Result<()> {
		let (_dir, store) = setup_test_db().await?;

		let entity = Entity::new("asset-A", "cve_asset", "Device", "web-01")
			.with_property("hostname", "web-01");
		store.add_entity(entity.clone()).await?;

		assert!(store.has_key("asset-A").await?);
		assert!(!store.has_key("asset-B").await?);
		assert_eq!(store.find_entity("asset-A").await?, Some(entity));
		assert_eq!(store.find_entity("asset-B").await?, None);
		assert!(store.add_entity(Entity::new("asset-A", "cve_asset", "Device", "dup")).await.is_err());

		store.set_data("ACCOUNT", json!({"key": "a"})).await?;
		store.set_data("ACCOUNT", json!({"key": "b"})).await?;
		assert_eq!(store.get_data("ACCOUNT").await?, Some(json!({"key": "b"})));
		assert_eq!(store.get_data("missing").await?, None);
		Ok(())
	}

	#[tokio::test]
	async fn test_relationship_batch_rolls_back_on_conflict() -> Result<()> {
		let (_dir, store) = setup_test_db().await?;
		let a = Entity::new("a", "thing", "Thing", "A");
		let b = Entity::new("b", "thing", "Thing", "B");
		let c = Entity::new("c", "thing", "Thing", "C");

		store.add_relationship(Relationship::direct(&a, "HAS", &b)).await?;

		let batch = vec![Relationship::direct(&a, "HAS", &c), Relationship::direct(&a, "HAS", &b)];
		assert!(store.add_relationships(batch).await.is_err());

		let stored = store.relationships_by_type("thing_has_thing").await?;
		assert_eq!(stored.len(), 1);
		assert_eq!(stored[0].to_key(), Some("b"));
		assert!(!store.has_key("a|has|c").await?);
		Ok(())
	}

	#[tokio::test]
	async fn test_new_run_starts_empty() -> Result<()> {
		let dir = tempdir()?;
		let pool = Arc::new(connection::establish_pool_with_path(&dir.path().join("test.db"))?);

		let first = SqliteJobState::for_new_run(pool.clone())?;
		let a = Entity::new("a", "thing", "Thing", "A");
		let b = Entity::new("b", "thing", "Thing", "B");
		first.add_entity(a.clone()).await?;
		first.add_relationship(Relationship::direct(&a, "HAS", &b)).await?;
		first.set_data("ACCOUNT", json!({"key": "a"})).await?;

		let second = SqliteJobState::for_new_run(pool)?;

		assert!(!second.has_key("a").await?);
		assert!(!second.has_key("a|has|b").await?);
		assert_eq!(second.get_data("ACCOUNT").await?, None);
		second.add_entity(a).await?;
		assert_eq!(second.entity_count_by_type("thing").await?, 1);
		Ok(())
	}
}
