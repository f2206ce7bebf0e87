// src/steps/account.rs

use crate::config::IntegrationConfig;
use crate::error::{StepError, StepResult};
use crate::models::entity::Entity;
use crate::steps::constants::{entities, steps, ACCOUNT_ENTITY_KEY};
use crate::steps::{Step, StepContext, StepMetadata};
use async_trait::async_trait;
use log::info;

pub fn create_account_entity(config: &IntegrationConfig) -> Entity {
	Entity::new(
		format!("{}:{}", entities::ACCOUNT_TYPE, config.account_id),
		entities::ACCOUNT_TYPE,
		entities::ACCOUNT_CLASS,
		config.account_name.clone(),
	)
	.with_property("account_id", config.account_id.clone())
	.with_property("name", config.account_name.clone())
	.with_property("web_link", config.api_base_url.clone())
}

/// Writes the account entity and publishes it for later steps.
pub struct AccountStep;

#[async_trait]
impl Step for AccountStep {
	fn metadata(&self) -> StepMetadata {
		StepMetadata {
			id: steps::ACCOUNT,
			name: "Fetch Account",
			entities: vec![entities::ACCOUNT_TYPE],
			relationships: vec![],
			depends_on: vec![],
		}
	}

	async fn execute(&self, context: &StepContext) -> StepResult<()> {
		let job_state = &context.job_state;
		let account = create_account_entity(&context.config);

		if !job_state.has_key(&account.key).await.map_err(StepError::Store)? {
			job_state.add_entity(account.clone()).await.map_err(StepError::Store)?;
		}

		let value = serde_json::to_value(&account)
			.map_err(|e| StepError::Store(e.into()))?;
		job_state.set_data(ACCOUNT_ENTITY_KEY, value).await.map_err(StepError::Store)?;

		info!("Stored account entity {}", account.key);
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::repositories::job_state::JobState;
	use crate::repositories::memory_job_state::MemoryJobState;
	use std::sync::Arc;

	#[tokio::test]
	async fn test_account_is_stored_and_published() -> anyhow::Result<()> {
		let store = Arc::new(MemoryJobState::new());
		let context = StepContext {
			config: crate::config::test_config(),
			job_state: store.clone(),
		};

		AccountStep.execute(&context).await?;
		AccountStep.execute(&context).await?;

		let published = store.get_data(ACCOUNT_ENTITY_KEY).await?.expect("account published");
		let account: Entity = serde_json::from_value(published)?;
		assert_eq!(account.key, "cve_account:acme");
		assert_eq!(account.display_name, "Acme Corp");
		assert_eq!(store.find_entity("cve_account:acme").await?, Some(account));
		assert_eq!(store.entity_count_by_type(entities::ACCOUNT_TYPE).await?, 1);
		Ok(())
	}
}
