// src/steps/mod.rs

pub mod account;
pub mod assets;
pub mod constants;
pub mod findings;

use crate::config::IntegrationConfig;
use crate::error::{StepError, StepResult};
use crate::repositories::job_state::JobState;
use crate::utils::api_client::ApiClient;
use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// What a step produces and which steps must finish before it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StepMetadata {
	pub id: &'static str,
	pub name: &'static str,
	pub entities: Vec<&'static str>,
	pub relationships: Vec<&'static str>,
	pub depends_on: Vec<&'static str>,
}

/// Everything a step may touch during execution.
#[derive(Clone)]
pub struct StepContext {
	pub config: IntegrationConfig,
	pub job_state: Arc<dyn JobState>,
}

#[async_trait]
pub trait Step: Send + Sync {
	fn metadata(&self) -> StepMetadata;

	async fn execute(&self, context: &StepContext) -> StepResult<()>;
}

/// All steps of the integration, sharing one API client.
pub fn integration_steps(config: &IntegrationConfig) -> StepResult<Vec<Box<dyn Step>>> {
	let client = Arc::new(ApiClient::new(config).map_err(StepError::Api)?);

	let steps: Vec<Box<dyn Step>> = vec![
		Box::new(account::AccountStep),
		Box::new(assets::AssetsStep::new(client.clone())),
		Box::new(findings::FindingsStep::new(client)),
	];
	Ok(steps)
}

/// Orders steps so that every step follows its dependencies.
///
/// Among steps whose dependencies are satisfied, declaration order wins.
pub fn execution_order(steps: &[StepMetadata]) -> StepResult<Vec<usize>> {
	let known: HashSet<&str> = steps.iter().map(|s| s.id).collect();
	for step in steps {
		if let Some(missing) = step.depends_on.iter().find(|d| !known.contains(*d)) {
			return Err(StepError::UnknownDependency {
				step: step.id.to_string(),
				dependency: missing.to_string(),
			});
		}
	}

	let mut done: HashSet<&str> = HashSet::new();
	let mut order = Vec::with_capacity(steps.len());

	while order.len() < steps.len() {
		let ready = steps.iter().enumerate().find(|(index, step)| {
			!order.contains(index) && step.depends_on.iter().all(|d| done.contains(d))
		});

		match ready {
			Some((index, step)) => {
				done.insert(step.id);
				order.push(index);
			}
			None => {
				let blocked = steps
					.iter()
					.enumerate()
					.filter(|(index, _)| !order.contains(index))
					.map(|(_, step)| step.id.to_string())
					.collect();
				return Err(StepError::DependencyCycle(blocked));
			}
		}
	}

	Ok(order)
}

/// Runs `steps` in dependency order, stopping at the first failure.
pub async fn run_steps(steps: &[Box<dyn Step>], context: &StepContext) -> StepResult<()> {
	let metadata: Vec<StepMetadata> = steps.iter().map(|s| s.metadata()).collect();
	let order = execution_order(&metadata)?;

	for index in order {
		let step = &metadata[index];
		info!("Starting step '{}' ({})", step.id, step.name);
		debug!(
			"Step '{}' produces entities {:?} and relationships {:?}",
			step.id, step.entities, step.relationships
		);
		let started = Instant::now();

		steps[index].execute(context).await?;

		info!("Finished step '{}' in {:?}", step.id, started.elapsed());
	}
	Ok(())
}
