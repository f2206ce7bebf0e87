// src/steps/findings/mod.rs

pub mod converter;

use crate::error::{StepError, StepResult};
use crate::models::cve::CveRecord;
use crate::models::entity::Entity;
use crate::repositories::job_state::JobState;
use crate::steps::constants::{entities, relationships, steps, ACCOUNT_ENTITY_KEY};
use crate::steps::{Step, StepContext, StepMetadata};
use crate::utils::api_client::CveSource;
use async_trait::async_trait;
use converter::{
	create_account_finding_relationship, create_asset_finding_relationship,
	create_finding_cve_relationship, create_finding_entity,
};
use futures::TryStreamExt;
use log::{debug, info};
use std::sync::Arc;

/// Counters reported when the findings step completes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FindingsSummary {
	pub findings_created: usize,
	pub duplicates_skipped: usize,
	pub asset_relationships: usize,
	pub missing_assets: usize,
}

/// Reads the account entity the account step published.
pub async fn load_account(job_state: &dyn JobState) -> StepResult<Entity> {
	let value = job_state
		.get_data(ACCOUNT_ENTITY_KEY)
		.await
		.map_err(StepError::Store)?
		.ok_or_else(|| StepError::MissingAccount { key: ACCOUNT_ENTITY_KEY.to_string() })?;

	serde_json::from_value(value).map_err(|e| StepError::Store(e.into()))
}

/// Stores the finding for one CVE record and its relationships.
///
/// The existence check runs before any write so a redelivered record
/// produces no writes at all.
async fn ingest_cve(
	job_state: &dyn JobState,
	account: &Entity,
	cve: &CveRecord,
	summary: &mut FindingsSummary,
) -> StepResult<()> {
	let finding = create_finding_entity(cve);

	// The API occasionally redelivers a record within one iteration.
	if job_state.has_key(&finding.key).await.map_err(StepError::Store)? {
		debug!("Skipping duplicate finding {}", finding.key);
		summary.duplicates_skipped += 1;
		return Ok(());
	}

	job_state.add_entity(finding.clone()).await.map_err(StepError::Store)?;
	summary.findings_created += 1;

	job_state
		.add_relationships(vec![
			create_account_finding_relationship(account, &finding),
			create_finding_cve_relationship(&finding, cve),
		])
		.await
		.map_err(StepError::Store)?;

	// Only an asset entity may own the finding; any other key is unresolved.
	let asset = job_state
		.find_entity(&cve.asset_unique_id)
		.await
		.map_err(StepError::Store)?
		.filter(|entity| entity.entity_type == entities::ASSET_TYPE);

	match asset {
		Some(asset) => {
			job_state
				.add_relationship(create_asset_finding_relationship(&asset, &finding))
				.await
				.map_err(StepError::Store)?;
			summary.asset_relationships += 1;
		}
		None => {
			debug!("Asset {} not found for finding {}", cve.asset_unique_id, finding.key);
			summary.missing_assets += 1;
		}
	}

	Ok(())
}

/// Consumes every CVE record from `source`, one at a time, into `job_state`.
pub async fn fetch_findings(job_state: &dyn JobState, source: &dyn CveSource) -> StepResult<FindingsSummary> {
	let account = load_account(job_state).await?;

	let mut summary = FindingsSummary::default();
	let mut cves = source.cves();
	while let Some(cve) = cves.try_next().await.map_err(StepError::Api)? {
		ingest_cve(job_state, &account, &cve, &mut summary).await?;
	}

	info!(
		"Stored {} findings ({} duplicates skipped, {} linked to assets, {} without a known asset)",
		summary.findings_created,
		summary.duplicates_skipped,
		summary.asset_relationships,
		summary.missing_assets
	);
	Ok(summary)
}

pub struct FindingsStep<S> {
	source: Arc<S>,
}

impl<S: CveSource> FindingsStep<S> {
	pub fn new(source: Arc<S>) -> Self {
		Self { source }
	}
}

#[async_trait]
impl<S: CveSource + 'static> Step for FindingsStep<S> {
	fn metadata(&self) -> StepMetadata {
		StepMetadata {
			id: steps::FINDINGS,
			name: "Fetch Findings",
			entities: vec![entities::FINDING_TYPE],
			relationships: vec![
				relationships::ACCOUNT_HAS_FINDING,
				relationships::ASSET_HAS_FINDING,
				relationships::FINDING_IS_CVE,
			],
			depends_on: vec![steps::ACCOUNT, steps::ASSETS],
		}
	}

	async fn execute(&self, context: &StepContext) -> StepResult<()> {
		fetch_findings(context.job_state.as_ref(), self.source.as_ref()).await?;
		Ok(())
	}
}
