// src/repositories/memory_job_state.rs

use crate::models::entity::{Entity, Relationship};
use crate::repositories::job_state::JobState;
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
	data: HashMap<String, Value>,
	entities: HashMap<String, Entity>,
	relationships: Vec<Relationship>,
	relationship_keys: HashSet<String>,
	writes: usize,
}

/// In-memory [`JobState`] used by tests and dry runs.
#[derive(Default)]
pub struct MemoryJobState {
	inner: RwLock<Inner>,
}

impl MemoryJobState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of successful entity and relationship writes so far.
	pub async fn write_count(&self) -> usize {
		self.inner.read().await.writes
	}
}

#[async_trait]
impl JobState for MemoryJobState {
	async fn set_data(&self, key: &str, value: Value) -> Result<()> {
		self.inner.write().await.data.insert(key.to_string(), value);
		Ok(())
	}

	async fn get_data(&self, key: &str) -> Result<Option<Value>> {
		Ok(self.inner.read().await.data.get(key).cloned())
	}

	async fn has_key(&self, key: &str) -> Result<bool> {
		let inner = self.inner.read().await;
		Ok(inner.entities.contains_key(key) || inner.relationship_keys.contains(key))
	}

	async fn find_entity(&self, key: &str) -> Result<Option<Entity>> {
		Ok(self.inner.read().await.entities.get(key).cloned())
	}

	async fn add_entity(&self, entity: Entity) -> Result<()> {
		let mut inner = self.inner.write().await;
		if inner.entities.contains_key(&entity.key) {
			bail!("Duplicate entity key: {}", entity.key);
		}
		inner.entities.insert(entity.key.clone(), entity);
		inner.writes += 1;
		Ok(())
	}

	async fn add_relationship(&self, relationship: Relationship) -> Result<()> {
		self.add_relationships(vec![relationship]).await
	}

	async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()> {
		let mut inner = self.inner.write().await;

		let mut batch_keys = HashSet::new();
		for relationship in &relationships {
			if inner.relationship_keys.contains(&relationship.key) || !batch_keys.insert(relationship.key.as_str()) {
				bail!("Duplicate relationship key: {}", relationship.key);
			}
		}

		for relationship in relationships {
			inner.relationship_keys.insert(relationship.key.clone());
			inner.relationships.push(relationship);
			inner.writes += 1;
		}
		Ok(())
	}

	async fn entity_count_by_type(&self, entity_type: &str) -> Result<usize> {
		let inner = self.inner.read().await;
		Ok(inner.entities.values().filter(|e| e.entity_type == entity_type).count())
	}

	async fn relationships_by_type(&self, relationship_type: &str) -> Result<Vec<Relationship>> {
		let inner = self.inner.read().await;
		Ok(inner
			.relationships
			.iter()
			.filter(|r| r.relationship_type == relationship_type)
			.cloned()
			.collect())
	}
}
