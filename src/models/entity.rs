// src/models/entity.rs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A graph node written to the job state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
	pub key: String,
	#[serde(rename = "type")]
	pub entity_type: String,
	pub class: String,
	pub display_name: String,
	pub properties: Map<String, Value>,
}

impl Entity {
	pub fn new(key: impl Into<String>, entity_type: &str, class: &str, display_name: impl Into<String>) -> Self {
		Self {
			key: key.into(),
			entity_type: entity_type.to_string(),
			class: class.to_string(),
			display_name: display_name.into(),
			properties: Map::new(),
		}
	}

	/// Sets a property, dropping it entirely when the value is null.
	pub fn with_property(mut self, name: &str, value: impl Into<Value>) -> Self {
		let value = value.into();
		if !value.is_null() {
			self.properties.insert(name.to_string(), value);
		}
		self
	}

	pub fn property_str(&self, name: &str) -> Option<&str> {
		self.properties.get(name).and_then(Value::as_str)
	}
}

/// The far side of a relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationshipTarget {
	/// An entity materialised in this job's store.
	Entity { key: String },
	/// An external entity resolved later by the graph builder from its
	/// identifying properties.
	Mapped {
		target_type: String,
		filter: Map<String, Value>,
		properties: Map<String, Value>,
		skip_target_creation: bool,
	},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
	pub key: String,
	#[serde(rename = "type")]
	pub relationship_type: String,
	pub class: String,
	pub from_key: String,
	pub to: RelationshipTarget,
}

impl Relationship {
	/// Direct relationship between two stored entities.
	pub fn direct(from: &Entity, class: &str, to: &Entity) -> Self {
		Self {
			key: relationship_key(&from.key, class, &to.key),
			relationship_type: relationship_type(&from.entity_type, class, &to.entity_type),
			class: class.to_string(),
			from_key: from.key.clone(),
			to: RelationshipTarget::Entity { key: to.key.clone() },
		}
	}

	/// Relationship whose target is identified by `filter` rather than by a
	/// stored entity key.
	pub fn mapped(
		from: &Entity,
		class: &str,
		target_type: &str,
		filter: Map<String, Value>,
		properties: Map<String, Value>,
	) -> Self {
		let target_id = filter
			.get("_key")
			.and_then(Value::as_str)
			.map(str::to_string)
			.unwrap_or_else(|| Value::Object(filter.clone()).to_string());

		Self {
			key: relationship_key(&from.key, class, &target_id),
			relationship_type: relationship_type(&from.entity_type, class, target_type),
			class: class.to_string(),
			from_key: from.key.clone(),
			to: RelationshipTarget::Mapped {
				target_type: target_type.to_string(),
				filter,
				properties,
				skip_target_creation: false,
			},
		}
	}

	pub fn to_key(&self) -> Option<&str> {
		match &self.to {
			RelationshipTarget::Entity { key } => Some(key),
			RelationshipTarget::Mapped { .. } => None,
		}
	}
}

pub fn relationship_key(from_key: &str, class: &str, to_key: &str) -> String {
	format!("{}|{}|{}", from_key, class.to_lowercase(), to_key)
}

pub fn relationship_type(from_type: &str, class: &str, to_type: &str) -> String {
	format!("{}_{}_{}", from_type, class.to_lowercase(), to_type)
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_null_properties_are_dropped() {
		let entity = Entity::new("k", "t", "C", "name")
			.with_property("present", "yes")
			.with_property("absent", Value::Null);

		assert_eq!(entity.property_str("present"), Some("yes"));
		assert!(!entity.properties.contains_key("absent"));
	}

	#[test]
	fn test_relationship_keys_and_types() {
		let account = Entity::new("cve_account:acme", "cve_account", "Account", "Acme");
		let finding = Entity::new("cve_finding:a:cve-1", "cve_finding", "Finding", "CVE-1");

		let rel = Relationship::direct(&account, "HAS", &finding);
		assert_eq!(rel.key, "cve_account:acme|has|cve_finding:a:cve-1");
		assert_eq!(rel.relationship_type, "cve_account_has_cve_finding");
		assert_eq!(rel.to_key(), Some("cve_finding:a:cve-1"));

		let mut filter = Map::new();
		filter.insert("_key".to_string(), json!("cve-1"));
		let mapped = Relationship::mapped(&finding, "IS", "cve", filter, Map::new());
		assert_eq!(mapped.key, "cve_finding:a:cve-1|is|cve-1");
		assert_eq!(mapped.relationship_type, "cve_finding_is_cve");
		assert_eq!(mapped.to_key(), None);
	}
}
