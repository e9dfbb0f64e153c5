//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.

use log::info;

use crate::effect::Effect;
use crate::error::{ReconcileError, ReconcileResult};
use crate::plan::Plan;
use crate::provider::Provider;
use crate::resource::{ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete succeeded; the identity is cleared
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ReconcileError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(_) => {
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    pub async fn execute_effect(&self, effect: &Effect) -> ReconcileResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Create(resource) => {
                let state = self.provider.create(resource).await?;
                info!(
                    "Created {} (identity: {})",
                    resource.id,
                    state.identifier.as_deref().unwrap_or("")
                );
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { from, to, .. } => {
                let identifier = from.identifier.as_deref().unwrap_or("");
                let state = self.provider.update(identifier, from, to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Delete {
                resource,
                identifier,
            } => {
                self.provider.delete(resource, identifier).await?;
                info!("Deleted {}", resource.id);
                Ok(EffectOutcome::Deleted {
                    id: resource.id.clone(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BoxFuture, ResourceType};
    use crate::resource::Resource;

    struct TestProvider;

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read<'a>(
            &'a self,
            resource: &'a Resource,
            _identifier: Option<&'a str>,
        ) -> BoxFuture<'a, ReconcileResult<State>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(State::not_found(id)) })
        }

        fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ReconcileResult<State>> {
            let state = State::existing(resource.id.clone(), resource.attributes.clone())
                .with_identifier("test-id");
            Box::pin(async move { Ok(state) })
        }

        fn update<'a>(
            &'a self,
            _identifier: &'a str,
            _from: &'a State,
            to: &'a Resource,
        ) -> BoxFuture<'a, ReconcileResult<State>> {
            let id = to.id.clone();
            Box::pin(async move {
                Err(ReconcileError::validation(&id, "attributes are immutable"))
            })
        }

        fn delete<'a>(
            &'a self,
            _resource: &'a Resource,
            _identifier: &'a str,
        ) -> BoxFuture<'a, ReconcileResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn update_effect(name: &str) -> Effect {
        Effect::Update {
            id: ResourceId::new("test", name),
            from: State::existing(ResourceId::new("test", name), Default::default())
                .with_identifier(name),
            to: Resource::new("test", name),
            changed_attributes: vec!["x".to_string()],
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider);
        let plan = Plan::new();
        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_create_and_delete_effects() {
        let interpreter = Interpreter::new(TestProvider);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));
        plan.add(Effect::Delete {
            resource: Resource::new("test", "old"),
            identifier: "old".to_string(),
        });

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 2);
        assert!(matches!(
            result.outcomes[1],
            Ok(EffectOutcome::Deleted { ref id }) if id.name == "old"
        ));
    }

    #[tokio::test]
    async fn stops_on_first_error_by_default() {
        let interpreter = Interpreter::new(TestProvider);
        let mut plan = Plan::new();
        plan.add(update_effect("a"));
        plan.add(Effect::Create(Resource::new("test", "b")));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn continue_on_error_runs_every_effect() {
        let config = InterpreterConfig {
            continue_on_error: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider).with_config(config);
        let mut plan = Plan::new();
        plan.add(update_effect("a"));
        plan.add(Effect::Create(Resource::new("test", "b")));

        let result = interpreter.apply(&plan).await;

        assert_eq!(result.failure_count, 1);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("test", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
    }
}
