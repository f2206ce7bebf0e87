// src/repositories/job_state.rs

use crate::models::entity::{Entity, Relationship};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Per-job store shared by every step of a run.
///
/// Entities and relationships are append-only and keyed by a unique string;
/// adding a key that is already present is an error. `has_key` answers for
/// both entity and relationship keys.
#[async_trait]
pub trait JobState: Send + Sync {
	async fn set_data(&self, key: &str, value: Value) -> Result<()>;

	async fn get_data(&self, key: &str) -> Result<Option<Value>>;

	async fn has_key(&self, key: &str) -> Result<bool>;

	async fn find_entity(&self, key: &str) -> Result<Option<Entity>>;

	async fn add_entity(&self, entity: Entity) -> Result<()>;

	async fn add_relationship(&self, relationship: Relationship) -> Result<()>;

	/// Adds all relationships or none of them.
	async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()>;

	async fn entity_count_by_type(&self, entity_type: &str) -> Result<usize>;

	async fn relationships_by_type(&self, relationship_type: &str) -> Result<Vec<Relationship>>;
}
