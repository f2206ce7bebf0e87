// src/steps/assets.rs

use crate::error::{StepError, StepResult};
use crate::models::cve::AssetRecord;
use crate::models::entity::{Entity, Relationship};
use crate::steps::constants::{entities, relationships, steps};
use crate::steps::findings::load_account;
use crate::steps::{Step, StepContext, StepMetadata};
use crate::utils::api_client::AssetSource;
use async_trait::async_trait;
use futures::TryStreamExt;
use log::{debug, info};
use std::sync::Arc;

/// Asset entities are keyed by the API's unique id so CVE records can
/// reference them directly.
pub fn create_asset_entity(asset: &AssetRecord) -> Entity {
	let display_name = asset
		.hostname
		.clone()
		.or_else(|| asset.ip_address.clone())
		.unwrap_or_else(|| asset.unique_id.clone());

	Entity::new(asset.unique_id.clone(), entities::ASSET_TYPE, entities::ASSET_CLASS, display_name)
		.with_property("unique_id", asset.unique_id.clone())
		.with_property("hostname", asset.hostname.clone())
		.with_property("ip_address", asset.ip_address.clone())
		.with_property("os", asset.os.clone())
}

pub struct AssetsStep<S> {
	source: Arc<S>,
}

impl<S: AssetSource> AssetsStep<S> {
	pub fn new(source: Arc<S>) -> Self {
		Self { source }
	}
}

#[async_trait]
impl<S: AssetSource + 'static> Step for AssetsStep<S> {
	fn metadata(&self) -> StepMetadata {
		StepMetadata {
			id: steps::ASSETS,
			name: "Fetch Assets",
			entities: vec![entities::ASSET_TYPE],
			relationships: vec![relationships::ACCOUNT_HAS_ASSET],
			depends_on: vec![steps::ACCOUNT],
		}
	}

	async fn execute(&self, context: &StepContext) -> StepResult<()> {
		let job_state = &context.job_state;
		let account = load_account(job_state.as_ref()).await?;

		let mut created = 0usize;
		let mut assets = self.source.assets();
		while let Some(record) = assets.try_next().await.map_err(StepError::Api)? {
			let asset = create_asset_entity(&record);
			if job_state.has_key(&asset.key).await.map_err(StepError::Store)? {
				debug!("Skipping duplicate asset {}", asset.key);
				continue;
			}

			let relationship = Relationship::direct(&account, relationships::HAS, &asset);
			job_state.add_entity(asset).await.map_err(StepError::Store)?;
			job_state.add_relationship(relationship).await.map_err(StepError::Store)?;
			created += 1;
		}

		info!("Stored {} assets", created);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repositories::job_state::JobState;
	use crate::repositories::memory_job_state::MemoryJobState;
	use crate::steps::account::AccountStep;
	use futures::stream::{self, BoxStream, StreamExt};

	struct FixedAssets(Vec<AssetRecord>);

	impl AssetSource for FixedAssets {
		fn assets(&self) -> BoxStream<'_, anyhow::Result<AssetRecord>> {
			stream::iter(self.0.clone().into_iter().map(Ok)).boxed()
		}
	}

	fn asset(id: &str, hostname: Option<&str>) -> AssetRecord {
		AssetRecord {
			unique_id: id.to_string(),
			hostname: hostname.map(str::to_string),
			ip_address: Some("10.0.0.1".to_string()),
			os: None,
		}
	}

	#[test]
	fn test_asset_display_name_fallbacks() {
		assert_eq!(create_asset_entity(&asset("a", Some("web-01"))).display_name, "web-01");
		assert_eq!(create_asset_entity(&asset("a", None)).display_name, "10.0.0.1");
	}

	#[tokio::test]
	async fn test_assets_are_linked_to_account_once() -> anyhow::Result<()> {
		let store = Arc::new(MemoryJobState::new());
		let context = StepContext {
			config: crate::config::test_config(),
			job_state: store.clone(),
		};
		let source = Arc::new(FixedAssets(vec![
			asset("asset-A", Some("web-01")),
			asset("asset-B", None),
			asset("asset-A", Some("web-01")),
		]));

		AccountStep.execute(&context).await?;
		AssetsStep::new(source).execute(&context).await?;

		assert_eq!(store.entity_count_by_type(entities::ASSET_TYPE).await?, 2);
		let links = store.relationships_by_type(relationships::ACCOUNT_HAS_ASSET).await?;
		assert_eq!(links.len(), 2);
		assert!(links.iter().all(|r| r.from_key == "cve_account:acme"));
		Ok(())
	}

	#[tokio::test]
	async fn test_assets_require_account() {
		let context = StepContext {
			config: crate::config::test_config(),
			job_state: Arc::new(MemoryJobState::new()),
		};
		let source = Arc::new(FixedAssets(vec![asset("asset-A", None)]));

		let result = AssetsStep::new(source).execute(&context).await;
		assert!(matches!(result, Err(StepError::MissingAccount { .. })));
	}
}
