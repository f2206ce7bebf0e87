// src/steps/findings/converter.rs

use crate::models::cve::CveRecord;
use crate::models::entity::{Entity, Relationship};
use crate::steps::constants::{entities, relationships};
use chrono::SecondsFormat;
use serde_json::{json, Map, Value};

const NVD_DETAIL_URL: &str = "https://nvd.nist.gov/vuln/detail";

/// Statuses after which a finding is no longer open.
const CLOSED_STATUSES: [&str; 4] = ["fixed", "resolved", "closed", "remediated"];

/// Stable key for the finding of `cve` on its asset.
///
/// The same CVE on two assets is two findings; the same CVE redelivered for
/// the same asset maps to the same key.
pub fn finding_key(cve: &CveRecord) -> String {
	format!(
		"{}:{}:{}",
		entities::FINDING_TYPE,
		cve.asset_unique_id,
		cve.cve_id.trim().to_lowercase()
	)
}

fn cve_web_link(cve_id: &str) -> String {
	format!("{}/{}", NVD_DETAIL_URL, cve_id.trim().to_uppercase())
}

/// Maps free-form vendor severities onto a fixed scale, falling back to the
/// CVSS score bands.
pub fn normalize_severity(severity: Option<&str>, cvss_score: Option<f64>) -> &'static str {
	let named = severity.map(|s| s.trim().to_lowercase());
	match named.as_deref() {
		Some("critical") => "critical",
		Some("high") | Some("important") => "high",
		Some("medium") | Some("moderate") => "medium",
		Some("low") => "low",
		Some("info") | Some("informational") | Some("none") => "info",
		_ => match cvss_score {
			Some(score) if score >= 9.0 => "critical",
			Some(score) if score >= 7.0 => "high",
			Some(score) if score >= 4.0 => "medium",
			Some(score) if score > 0.0 => "low",
			Some(_) => "info",
			None => "unknown",
		},
	}
}

fn numeric_severity(severity: &str, cvss_score: Option<f64>) -> Option<f64> {
	if let Some(score) = cvss_score.filter(|s| (0.0..=10.0).contains(s)) {
		return Some(score);
	}
	match severity {
		"critical" => Some(10.0),
		"high" => Some(7.0),
		"medium" => Some(5.0),
		"low" => Some(2.0),
		"info" => Some(0.0),
		_ => None,
	}
}

pub fn create_finding_entity(cve: &CveRecord) -> Entity {
	let cve_id = cve.cve_id.trim().to_uppercase();
	let severity = normalize_severity(cve.severity.as_deref(), cve.cvss_score);
	let open = cve
		.status
		.as_deref()
		.map(|s| !CLOSED_STATUSES.contains(&s.trim().to_lowercase().as_str()))
		.unwrap_or(true);

	Entity::new(finding_key(cve), entities::FINDING_TYPE, entities::FINDING_CLASS, cve_id.clone())
		.with_property("cve_id", cve_id.clone())
		.with_property("name", cve_id.clone())
		.with_property("title", cve.title.clone().unwrap_or_else(|| cve_id.clone()))
		.with_property("description", cve.description.clone())
		.with_property("severity", severity)
		.with_property("numeric_severity", numeric_severity(severity, cve.cvss_score))
		.with_property("cvss_score", cve.cvss_score)
		.with_property("cvss_vector", cve.cvss_vector.clone())
		.with_property("first_seen", cve.first_seen.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
		.with_property("last_seen", cve.last_seen.map(|ts| ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
		.with_property("status", cve.status.clone())
		.with_property("open", open)
		.with_property("solution", cve.solution.clone())
		.with_property("asset_unique_id", cve.asset_unique_id.clone())
		.with_property("web_link", cve_web_link(&cve_id))
}

pub fn create_account_finding_relationship(account: &Entity, finding: &Entity) -> Relationship {
	Relationship::direct(account, relationships::HAS, finding)
}

pub fn create_asset_finding_relationship(asset: &Entity, finding: &Entity) -> Relationship {
	Relationship::direct(asset, relationships::HAS, finding)
}

/// Finding -IS-> CVE, targeting the catalog entity by its lower-cased id.
pub fn create_finding_cve_relationship(finding: &Entity, cve: &CveRecord) -> Relationship {
	let cve_id = cve.cve_id.trim().to_uppercase();

	let mut filter = Map::new();
	filter.insert("_key".to_string(), json!(cve_id.to_lowercase()));

	let mut properties = Map::new();
	properties.insert("name".to_string(), Value::String(cve_id.clone()));
	properties.insert("display_name".to_string(), Value::String(cve_id.clone()));
	properties.insert("web_link".to_string(), Value::String(cve_web_link(&cve_id)));

	Relationship::mapped(finding, relationships::IS, entities::CVE_TYPE, filter, properties)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::models::cve::parse_timestamp;
	use crate::models::entity::RelationshipTarget;

	fn sample_cve() -> CveRecord {
		let mut cve = CveRecord::new("cve-2024-1234", "asset-A");
		cve.cvss_score = Some(8.1);
		cve.status = Some("Open".to_string());
		cve.description = Some("Heap overflow".to_string());
		cve
	}

	#[test]
	fn test_finding_key_is_deterministic() {
		let cve = sample_cve();
		let mut redelivered = sample_cve();
		redelivered.cve_id = " CVE-2024-1234 ".to_string();
		redelivered.last_seen = parse_timestamp("2024-06-01");

		assert_eq!(finding_key(&cve), "cve_finding:asset-A:cve-2024-1234");
		assert_eq!(finding_key(&cve), finding_key(&redelivered));

		let other_asset = CveRecord::new("CVE-2024-1234", "asset-B");
		assert_ne!(finding_key(&cve), finding_key(&other_asset));
	}

	#[test]
	fn test_finding_entity_properties() {
		let finding = create_finding_entity(&sample_cve());

		assert_eq!(finding.entity_type, "cve_finding");
		assert_eq!(finding.class, "Finding");
		assert_eq!(finding.display_name, "CVE-2024-1234");
		assert_eq!(finding.property_str("severity"), Some("high"));
		assert_eq!(finding.properties.get("numeric_severity"), Some(&json!(8.1)));
		assert_eq!(finding.properties.get("open"), Some(&json!(true)));
		assert_eq!(finding.property_str("title"), Some("CVE-2024-1234"));
		assert_eq!(
			finding.property_str("web_link"),
			Some("https://nvd.nist.gov/vuln/detail/CVE-2024-1234")
		);
		assert!(!finding.properties.contains_key("solution"));
	}

	#[test]
	fn test_seen_timestamps_are_normalised() {
		let mut cve = sample_cve();
		cve.first_seen = parse_timestamp("2024-03-01T10:15:00+02:00");
		cve.last_seen = parse_timestamp("2024-06-01");

		let finding = create_finding_entity(&cve);

		assert_eq!(finding.property_str("first_seen"), Some("2024-03-01T08:15:00Z"));
		assert_eq!(finding.property_str("last_seen"), Some("2024-06-01T00:00:00Z"));
		assert!(!create_finding_entity(&sample_cve()).properties.contains_key("first_seen"));
	}

	#[test]
	fn test_closed_status_marks_finding_closed() {
		let mut cve = sample_cve();
		cve.status = Some("Resolved".to_string());

		let finding = create_finding_entity(&cve);
		assert_eq!(finding.properties.get("open"), Some(&json!(false)));
	}

	#[test]
	fn test_severity_normalization() {
		assert_eq!(normalize_severity(Some("Moderate"), None), "medium");
		assert_eq!(normalize_severity(Some("CRITICAL"), Some(1.0)), "critical");
		assert_eq!(normalize_severity(Some("weird"), Some(9.5)), "critical");
		assert_eq!(normalize_severity(None, Some(4.0)), "medium");
		assert_eq!(normalize_severity(None, Some(0.0)), "info");
		assert_eq!(normalize_severity(None, None), "unknown");

		assert_eq!(numeric_severity("high", None), Some(7.0));
		assert_eq!(numeric_severity("unknown", Some(42.0)), None);
	}

	#[test]
	fn test_finding_cve_relationship_is_mapped() {
		let cve = sample_cve();
		let finding = create_finding_entity(&cve);
		let rel = create_finding_cve_relationship(&finding, &cve);

		assert_eq!(rel.relationship_type, "cve_finding_is_cve");
		assert_eq!(rel.from_key, finding.key);
		match rel.to {
			RelationshipTarget::Mapped { target_type, filter, properties, skip_target_creation } => {
				assert_eq!(target_type, "cve");
				assert_eq!(filter.get("_key"), Some(&json!("cve-2024-1234")));
				assert_eq!(properties.get("name"), Some(&json!("CVE-2024-1234")));
				assert!(!skip_target_creation);
			}
			other => panic!("expected mapped target, got {:?}", other),
		}
	}
}
