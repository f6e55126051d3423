//! Saga Orchestration for Tenant Provisioning
//!
//! Each step is one remote call with a compensating action. When step *k*
//! fails, compensations for steps `k-1..1` run in reverse order.
//! Compensation failures are recorded on the execution but never replace
//! the original error. Best-effort steps log their failure and the saga
//! moves on.

use crate::cloud::CloudApi;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use fittrack_common::CloudflareError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Saga step status
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    /// Failed, but the step is optional
    Skipped,
    Compensated,
    CompensationFailed,
}

/// Saga overall status
#[allow(missing_docs)]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaStatus {
    Pending,
    Running,
    Completed,
    Compensating,
    Compensated,
    /// Compensation itself failed; resources may be orphaned
    Failed,
}

/// Saga step record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SagaStep {
    /// Step id
    pub id: String,
    /// Step name from the definition
    pub name: String,
    /// Current status
    pub status: StepStatus,
    /// When execution began
    pub started_at: Option<DateTime<Utc>>,
    /// When execution or compensation ended
    pub completed_at: Option<DateTime<Utc>>,
    /// Value returned by the step
    pub output: Option<Value>,
    /// Step or compensation error
    pub error: Option<String>,
}

/// Saga execution record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SagaExecution {
    /// Execution id
    pub id: String,
    /// Definition that ran
    pub saga_type: String,
    /// Overall status
    pub status: SagaStatus,
    /// Steps in definition order
    pub steps: Vec<SagaStep>,
    /// Input the definition was started with
    pub input: Value,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time, once finished
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaExecution {
    /// Pending execution with no steps yet
    pub fn new(saga_type: impl Into<String>, input: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            saga_type: saga_type.into(),
            status: SagaStatus::Pending,
            steps: vec![],
            input,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Output of a completed step
    pub fn output_of(&self, step: &str) -> Option<&Value> {
        self.steps
            .iter()
            .find(|s| s.name == step && s.status == StepStatus::Completed)
            .and_then(|s| s.output.as_ref())
    }
}

/// Saga errors
#[derive(Error, Debug)]
pub enum SagaError {
    /// A forward step failed against the cloud API
    #[error("step {step} failed: {source}")]
    StepFailed {
        /// Failing step
        step: String,
        /// Cloud API error
        #[source]
        source: CloudflareError,
    },

    /// Input or a previous step's output was unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SagaError {
    /// Upstream payload for error responses
    pub fn details(&self) -> Value {
        match self {
            Self::StepFailed { source, .. } => source.details(),
            Self::InvalidInput(msg) => Value::String(msg.clone()),
        }
    }
}

/// Saga definition trait
#[async_trait]
pub trait SagaDefinition: Send + Sync {
    /// Name recorded on executions
    fn saga_type(&self) -> &'static str;
    /// Forward steps, in order
    fn step_names(&self) -> Vec<&'static str>;
    /// Failure of a best-effort step is tolerated
    fn is_best_effort(&self, _step: &str) -> bool {
        false
    }
    /// Run one forward step; the value is kept as the step output
    async fn execute_step(&self, step: &str, execution: &SagaExecution) -> Result<Value, SagaError>;
    /// Undo a completed step
    async fn compensate_step(&self, step: &str, execution: &SagaExecution) -> Result<(), SagaError>;
}

/// Saga orchestrator
#[derive(Debug, Default)]
pub struct SagaOrchestrator;

impl SagaOrchestrator {
    /// Create an orchestrator
    pub fn new() -> Self {
        Self
    }

    /// Execute saga with automatic compensation on failure
    pub async fn execute<T>(&self, saga: &T, execution: &mut SagaExecution) -> Result<(), SagaError>
    where
        T: SagaDefinition + ?Sized,
    {
        execution.status = SagaStatus::Running;

        for step_name in saga.step_names() {
            tracing::info!(saga = %execution.id, step = step_name, "Running step");
            execution.steps.push(SagaStep {
                id: Uuid::new_v4().to_string(),
                name: step_name.to_string(),
                status: StepStatus::Running,
                started_at: Some(Utc::now()),
                completed_at: None,
                output: None,
                error: None,
            });

            let result = saga.execute_step(step_name, execution).await;
            let Some(step) = execution.steps.last_mut() else {
                continue;
            };
            step.completed_at = Some(Utc::now());

            match result {
                Ok(output) => {
                    step.status = StepStatus::Completed;
                    step.output = Some(output);
                }
                Err(e) if saga.is_best_effort(step_name) => {
                    tracing::warn!(saga = %execution.id, step = step_name, "Best-effort step failed: {}", e);
                    step.status = StepStatus::Skipped;
                    step.error = Some(e.to_string());
                }
                Err(e) => {
                    tracing::error!(saga = %execution.id, step = step_name, "Step failed: {}", e);
                    step.status = StepStatus::Failed;
                    step.error = Some(e.to_string());

                    self.compensate(saga, execution).await;
                    return Err(e);
                }
            }
        }

        execution.status = SagaStatus::Completed;
        execution.completed_at = Some(Utc::now());
        Ok(())
    }

    // Compensate all completed steps in reverse
    async fn compensate<T>(&self, saga: &T, execution: &mut SagaExecution)
    where
        T: SagaDefinition + ?Sized,
    {
        execution.status = SagaStatus::Compensating;
        let mut clean = true;

        for j in (0..execution.steps.len()).rev() {
            if execution.steps[j].status != StepStatus::Completed {
                continue;
            }
            let name = execution.steps[j].name.clone();
            let result = saga.compensate_step(&name, execution).await;

            let step = &mut execution.steps[j];
            match result {
                Ok(()) => {
                    tracing::info!(saga = %execution.id, step = %name, "Compensated");
                    step.status = StepStatus::Compensated;
                }
                Err(e) => {
                    tracing::error!(saga = %execution.id, step = %name, "Compensation failed: {}", e);
                    step.status = StepStatus::CompensationFailed;
                    step.error = Some(e.to_string());
                    clean = false;
                }
            }
        }

        execution.status = if clean { SagaStatus::Compensated } else { SagaStatus::Failed };
        execution.completed_at = Some(Utc::now());
    }
}

/// Resources created for one tenant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionedResources {
    /// Worker name
    pub resource_name: String,
    /// KV namespace id
    pub namespace_id: String,
}

/// Namespace, compute unit, binding, subdomain
pub struct TenantProvisioningSaga {
    cloud: Arc<dyn CloudApi>,
    script: Bytes,
    binding: String,
}

#[allow(missing_docs)]
impl TenantProvisioningSaga {
    pub const CREATE_NAMESPACE: &'static str = "create_namespace";
    pub const DEPLOY_COMPUTE_UNIT: &'static str = "deploy_compute_unit";
    pub const BIND_NAMESPACE: &'static str = "bind_namespace";
    pub const ENABLE_SUBDOMAIN: &'static str = "enable_subdomain";

    pub fn new(cloud: Arc<dyn CloudApi>, script: Bytes, binding: impl Into<String>) -> Self {
        Self { cloud, script, binding: binding.into() }
    }

    /// Saga input for a resource name
    pub fn input(resource_name: &str, namespace_title: &str) -> Value {
        json!({ "resource_name": resource_name, "namespace_title": namespace_title })
    }

    /// Provisioned resources of a completed execution
    pub fn resources(execution: &SagaExecution) -> Result<ProvisionedResources, SagaError> {
        Ok(ProvisionedResources {
            resource_name: input_str(execution, "resource_name")?.to_string(),
            namespace_id: namespace_id(execution)?.to_string(),
        })
    }
}

#[async_trait]
impl SagaDefinition for TenantProvisioningSaga {
    fn saga_type(&self) -> &'static str {
        "tenant_provisioning"
    }

    fn step_names(&self) -> Vec<&'static str> {
        vec![
            Self::CREATE_NAMESPACE,
            Self::DEPLOY_COMPUTE_UNIT,
            Self::BIND_NAMESPACE,
            Self::ENABLE_SUBDOMAIN,
        ]
    }

    fn is_best_effort(&self, step: &str) -> bool {
        step == Self::ENABLE_SUBDOMAIN
    }

    async fn execute_step(&self, step: &str, execution: &SagaExecution) -> Result<Value, SagaError> {
        let unit = input_str(execution, "resource_name")?;
        let failed = |source| SagaError::StepFailed { step: step.to_string(), source };

        match step {
            Self::CREATE_NAMESPACE => {
                let title = input_str(execution, "namespace_title")?;
                let id = self.cloud.create_namespace(title).await.map_err(failed)?;
                tracing::info!(namespace = %id, "Namespace created");
                Ok(json!({ "namespace_id": id }))
            }
            Self::DEPLOY_COMPUTE_UNIT => {
                self.cloud.deploy_unit(unit, self.script.clone()).await.map_err(failed)?;
                Ok(json!({ "unit": unit }))
            }
            Self::BIND_NAMESPACE => {
                let ns = namespace_id(execution)?;
                self.cloud.bind_namespace(unit, &self.binding, ns).await.map_err(failed)?;
                Ok(json!({ "binding": self.binding, "namespace_id": ns }))
            }
            Self::ENABLE_SUBDOMAIN => {
                self.cloud.enable_subdomain(unit).await.map_err(failed)?;
                Ok(json!({ "enabled": true }))
            }
            other => Err(SagaError::InvalidInput(format!("unknown step {}", other))),
        }
    }

    async fn compensate_step(&self, step: &str, execution: &SagaExecution) -> Result<(), SagaError> {
        let unit = input_str(execution, "resource_name")?;
        let failed = |source| SagaError::StepFailed { step: step.to_string(), source };

        match step {
            Self::CREATE_NAMESPACE => {
                let ns = namespace_id(execution)?;
                self.cloud.delete_namespace(ns).await.map_err(failed)
            }
            Self::DEPLOY_COMPUTE_UNIT => self.cloud.delete_unit(unit).await.map_err(failed),
            Self::BIND_NAMESPACE => self.cloud.unbind_namespace(unit).await.map_err(failed),
            _ => Ok(()),
        }
    }
}

fn input_str<'a>(execution: &'a SagaExecution, field: &str) -> Result<&'a str, SagaError> {
    execution.input[field]
        .as_str()
        .ok_or_else(|| SagaError::InvalidInput(format!("missing {}", field)))
}

fn namespace_id(execution: &SagaExecution) -> Result<&str, SagaError> {
    execution
        .output_of(TenantProvisioningSaga::CREATE_NAMESPACE)
        .and_then(|o| o["namespace_id"].as_str())
        .ok_or_else(|| SagaError::InvalidInput("namespace not created".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::testing::RecordingCloud;

    async fn run(cloud: Arc<RecordingCloud>) -> (Result<(), SagaError>, SagaExecution) {
        let saga = TenantProvisioningSaga::new(cloud, Bytes::from_static(b"script"), "FITTRACK_KV");
        let mut execution = SagaExecution::new(
            saga.saga_type(),
            TenantProvisioningSaga::input("fittrackjane", "fittrackjane-kv"),
        );
        let result = SagaOrchestrator::new().execute(&saga, &mut execution).await;
        (result, execution)
    }

    #[test]
    fn test_saga_execution_new() {
        let input = json!({"resource_name": "fittrackjane"});
        let exec = SagaExecution::new("tenant_provisioning", input);

        assert_eq!(exec.status, SagaStatus::Pending);
        assert!(exec.steps.is_empty());
    }

    #[tokio::test]
    async fn test_happy_path_order() {
        let cloud = Arc::new(RecordingCloud::default());
        let (result, execution) = run(cloud.clone()).await;

        result.unwrap();
        assert_eq!(execution.status, SagaStatus::Completed);
        assert_eq!(
            cloud.calls(),
            vec![
                "create_namespace fittrackjane-kv",
                "deploy_unit fittrackjane",
                "bind_namespace fittrackjane FITTRACK_KV=ns-1",
                "enable_subdomain fittrackjane",
            ]
        );
        let resources = TenantProvisioningSaga::resources(&execution).unwrap();
        assert_eq!(resources.namespace_id, "ns-1");
    }

    #[tokio::test]
    async fn test_failure_compensates_in_reverse() {
        let cloud = Arc::new(RecordingCloud::failing(&["bind_namespace"]));
        let (result, execution) = run(cloud.clone()).await;

        let err = result.unwrap_err();
        assert!(matches!(&err, SagaError::StepFailed { step, .. } if step == "bind_namespace"));
        assert_eq!(err.details()[0]["code"], 10000);
        assert_eq!(execution.status, SagaStatus::Compensated);
        assert_eq!(
            cloud.calls()[3..],
            ["delete_unit fittrackjane", "delete_namespace ns-1"]
        );
        assert_eq!(execution.steps[0].status, StepStatus::Compensated);
        assert_eq!(execution.steps[2].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_first_step_failure_needs_no_compensation() {
        let cloud = Arc::new(RecordingCloud::failing(&["create_namespace"]));
        let (result, execution) = run(cloud.clone()).await;

        assert!(result.is_err());
        assert_eq!(cloud.calls().len(), 1);
        assert_eq!(execution.status, SagaStatus::Compensated);
    }

    #[tokio::test]
    async fn test_subdomain_is_best_effort() {
        let cloud = Arc::new(RecordingCloud::failing(&["enable_subdomain"]));
        let (result, execution) = run(cloud.clone()).await;

        result.unwrap();
        assert_eq!(execution.status, SagaStatus::Completed);
        assert_eq!(execution.steps[3].status, StepStatus::Skipped);
        assert!(!cloud.calls().iter().any(|c| c.starts_with("delete")));
    }

    #[tokio::test]
    async fn test_compensation_failure_keeps_original_error() {
        let cloud = Arc::new(RecordingCloud::failing(&["bind_namespace", "delete_unit"]));
        let (result, execution) = run(cloud.clone()).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("bind_namespace"));
        assert_eq!(execution.status, SagaStatus::Failed);
        assert_eq!(execution.steps[1].status, StepStatus::CompensationFailed);
        // Remaining compensations still run
        assert_eq!(execution.steps[0].status, StepStatus::Compensated);
    }
}
