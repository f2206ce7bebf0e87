// src/models/cve.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A vulnerability occurrence as returned by the security-data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CveRecord {
	pub cve_id: String,
	pub asset_unique_id: String,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub severity: Option<String>,
	#[serde(default)]
	pub cvss_score: Option<f64>,
	#[serde(default)]
	pub cvss_vector: Option<String>,
	#[serde(default, deserialize_with = "deserialize_timestamp")]
	pub first_seen: Option<DateTime<Utc>>,
	#[serde(default, deserialize_with = "deserialize_timestamp")]
	pub last_seen: Option<DateTime<Utc>>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub solution: Option<String>,
}

impl CveRecord {
	pub fn new(cve_id: impl Into<String>, asset_unique_id: impl Into<String>) -> Self {
		Self {
			cve_id: cve_id.into(),
			asset_unique_id: asset_unique_id.into(),
			title: None,
			description: None,
			severity: None,
			cvss_score: None,
			cvss_vector: None,
			first_seen: None,
			last_seen: None,
			status: None,
			solution: None,
		}
	}
}

/// Parses an API timestamp into UTC.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and bare
/// `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
	let raw = raw.trim();
	if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
		return Some(ts.with_timezone(&Utc));
	}
	if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
		return Some(ts.and_utc());
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|ts| ts.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
	D: Deserializer<'de>,
{
	match Option::<String>::deserialize(deserializer)? {
		None => Ok(None),
		Some(raw) if raw.trim().is_empty() => Ok(None),
		Some(raw) => parse_timestamp(&raw)
			.map(Some)
			.ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
	}
}

/// An asset as returned by the security-data API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
	pub unique_id: String,
	#[serde(default)]
	pub hostname: Option<String>,
	#[serde(default)]
	pub ip_address: Option<String>,
	#[serde(default)]
	pub os: Option<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_optional_fields_default_to_none() {
		let record: CveRecord = serde_json::from_str(
			r#"{"cve_id": "CVE-2024-0001", "asset_unique_id": "asset-A", "cvss_score": 9.8}"#,
		)
		.unwrap();

		assert_eq!(record.cve_id, "CVE-2024-0001");
		assert_eq!(record.cvss_score, Some(9.8));
		assert!(record.severity.is_none());
	}

	#[test]
	fn test_timestamps_are_parsed_as_utc() {
		let record: CveRecord = serde_json::from_str(
			r#"{"cve_id": "CVE-2024-0001", "asset_unique_id": "asset-A",
				"first_seen": "2024-03-01T10:15:00+02:00", "last_seen": "2024-06-01"}"#,
		)
		.unwrap();

		assert_eq!(record.first_seen.unwrap().to_rfc3339(), "2024-03-01T08:15:00+00:00");
		assert_eq!(record.last_seen, parse_timestamp("2024-06-01 00:00:00"));
		assert!(parse_timestamp("last tuesday").is_none());

		let blank: CveRecord = serde_json::from_str(
			r#"{"cve_id": "CVE-2024-0001", "asset_unique_id": "asset-A", "first_seen": "", "last_seen": null}"#,
		)
		.unwrap();
		assert!(blank.first_seen.is_none() && blank.last_seen.is_none());
	}

	#[test]
	fn test_malformed_timestamp_fails_to_parse() {
		let result = serde_json::from_str::<CveRecord>(
			r#"{"cve_id": "CVE-2024-0001", "asset_unique_id": "asset-A", "first_seen": "03/01/2024"}"#,
		);
		assert!(result.is_err());
	}

	#[test]
	fn test_missing_asset_reference_fails_to_parse() {
		let result = serde_json::from_str::<CveRecord>(r#"{"cve_id": "CVE-2024-0001"}"#);
		assert!(result.is_err());
	}
}
