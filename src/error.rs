use thiserror::Error;

/// Failures that abort a step.
///
/// A missing asset or a redelivered CVE are not represented here; the
/// findings step treats both as ordinary branches.
#[derive(Debug, Error)]
pub enum StepError {
	#[error("account entity not found in job state under '{key}'")]
	MissingAccount { key: String },

	#[error("API request failed: {0:#}")]
	Api(anyhow::Error),

	#[error("job state operation failed: {0:#}")]
	Store(anyhow::Error),

	#[error("invalid configuration: {0}")]
	Config(String),

	#[error("step '{step}' depends on unknown step '{dependency}'")]
	UnknownDependency { step: String, dependency: String },

	#[error("step dependency cycle detected among: {0:?}")]
	DependencyCycle(Vec<String>),
}

pub type StepResult<T> = std::result::Result<T, StepError>;
