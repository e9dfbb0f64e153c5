//! Tideline AWS Provider
//!
//! Reconcilers for Auto Scaling scheduled actions and RDS DB security
//! groups, dispatched by resource type behind the [`Provider`] trait.

pub mod api;
pub mod db_security_group;
pub mod scheduled_action;
pub mod schemas;
pub mod sdk;
pub mod settings;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tideline_core::error::{ReconcileError, ReconcileResult};
use tideline_core::provider::{BoxFuture, Provider, ResourceType};
use tideline_core::resource::{Resource, State};
use tideline_core::schema::ResourceSchema;

use crate::api::{DbSecurityGroupApi, ScheduledActionApi};
use crate::db_security_group::DbSecurityGroupReconciler;
use crate::scheduled_action::ScheduledActionReconciler;
use crate::sdk::{AutoscalingSdk, RdsSdk};
use crate::settings::ProviderSettings;

/// Auto Scaling scheduled action resource type
pub struct ScheduledActionType;

impl ResourceType for ScheduledActionType {
    fn name(&self) -> &'static str {
        scheduled_action::RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        schemas::autoscaling::scheduled_action_schema()
    }
}

/// RDS DB security group resource type
pub struct DbSecurityGroupType;

impl ResourceType for DbSecurityGroupType {
    fn name(&self) -> &'static str {
        db_security_group::RESOURCE_TYPE
    }

    fn schema(&self) -> ResourceSchema {
        schemas::rds::db_security_group_schema()
    }
}

/// AWS Provider
pub struct AwsProvider {
    scheduled_actions: ScheduledActionReconciler,
    db_security_groups: DbSecurityGroupReconciler,
    scheduled_action_schema: ResourceSchema,
    db_security_group_schema: ResourceSchema,
}

impl AwsProvider {
    /// Build SDK clients for the configured region
    pub async fn new(settings: &ProviderSettings) -> Self {
        let config = sdk::load_config(&settings.region).await;
        Self::with_apis(
            Arc::new(AutoscalingSdk::new(&config)),
            Arc::new(RdsSdk::new(&config)),
            settings,
        )
    }

    /// Build on explicit API facades
    pub fn with_apis(
        autoscaling: Arc<dyn ScheduledActionApi>,
        rds: Arc<dyn DbSecurityGroupApi>,
        settings: &ProviderSettings,
    ) -> Self {
        Self {
            scheduled_actions: ScheduledActionReconciler::new(autoscaling),
            db_security_groups: DbSecurityGroupReconciler::new(rds)
                .with_wait_config(settings.wait_config())
                .with_authorize_concurrency(settings.authorize_concurrency),
            scheduled_action_schema: schemas::autoscaling::scheduled_action_schema(),
            db_security_group_schema: schemas::rds::db_security_group_schema(),
        }
    }

    async fn read_resource(
        &self,
        resource: &Resource,
        identifier: Option<&str>,
    ) -> ReconcileResult<State> {
        let id = &resource.id;
        match id.resource_type.as_str() {
            scheduled_action::RESOURCE_TYPE => {
                let group = string_attribute(resource, "autoscaling_group_name")?;
                let name = match identifier {
                    Some(name) => name,
                    None => string_attribute(resource, "scheduled_action_name")?,
                };
                Ok(match self.scheduled_actions.read(id, group, name).await? {
                    Some(action) => action.to_state(id.clone()),
                    None => State::not_found(id.clone()),
                })
            }
            db_security_group::RESOURCE_TYPE => {
                let name = match identifier {
                    Some(name) => name,
                    None => string_attribute(resource, "name")?,
                };
                Ok(match self.db_security_groups.read(id, name).await? {
                    Some(group) => group.to_state(id.clone()),
                    None => State::not_found(id.clone()),
                })
            }
            other => Err(unknown_type(resource, other)),
        }
    }

    async fn create_resource(&self, resource: &Resource) -> ReconcileResult<State> {
        match resource.id.resource_type.as_str() {
            scheduled_action::RESOURCE_TYPE => {
                let desired = self.scheduled_action_schema.bind(resource)?;
                let action = self.scheduled_actions.create(&desired).await?;
                Ok(action.to_state(resource.id.clone()))
            }
            db_security_group::RESOURCE_TYPE => {
                let desired = self.db_security_group_schema.bind(resource)?;
                let group = self.db_security_groups.create(&desired).await?;
                Ok(group.to_state(resource.id.clone()))
            }
            other => Err(unknown_type(resource, other)),
        }
    }

    async fn update_resource(
        &self,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ReconcileResult<State> {
        match to.id.resource_type.as_str() {
            scheduled_action::RESOURCE_TYPE => {
                let group = from
                    .attributes
                    .get("autoscaling_group_name")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        ReconcileError::validation(
                            &to.id,
                            "Current state has no autoscaling_group_name",
                        )
                    })?;
                let desired = self.scheduled_action_schema.bind(to)?;
                let action = self
                    .scheduled_actions
                    .update(group, identifier, &desired)
                    .await?;
                Ok(action.to_state(to.id.clone()))
            }
            db_security_group::RESOURCE_TYPE => {
                let group = self.db_security_groups.update(&to.id)?;
                Ok(group.to_state(to.id.clone()))
            }
            other => Err(unknown_type(to, other)),
        }
    }

    async fn delete_resource(&self, resource: &Resource, identifier: &str) -> ReconcileResult<()> {
        let id = &resource.id;
        match id.resource_type.as_str() {
            scheduled_action::RESOURCE_TYPE => {
                let group = string_attribute(resource, "autoscaling_group_name")?;
                self.scheduled_actions.delete(id, group, identifier).await
            }
            db_security_group::RESOURCE_TYPE => self.db_security_groups.delete(id, identifier).await,
            other => Err(unknown_type(resource, other)),
        }
    }
}

fn string_attribute<'a>(resource: &'a Resource, name: &str) -> ReconcileResult<&'a str> {
    resource
        .attributes
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ReconcileError::validation(
                &resource.id,
                format!("Required attribute '{}' is missing", name),
            )
        })
}

fn unknown_type(resource: &Resource, resource_type: &str) -> ReconcileError {
    ReconcileError::validation(
        &resource.id,
        format!("Unknown resource type: {}", resource_type),
    )
}

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        vec![Box::new(ScheduledActionType), Box::new(DbSecurityGroupType)]
    }

    fn read<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: Option<&'a str>,
    ) -> BoxFuture<'a, ReconcileResult<State>> {
        Box::pin(self.read_resource(resource, identifier))
    }

    fn create<'a>(&'a self, resource: &'a Resource) -> BoxFuture<'a, ReconcileResult<State>> {
        Box::pin(self.create_resource(resource))
    }

    fn update<'a>(
        &'a self,
        identifier: &'a str,
        from: &'a State,
        to: &'a Resource,
    ) -> BoxFuture<'a, ReconcileResult<State>> {
        Box::pin(self.update_resource(identifier, from, to))
    }

    fn delete<'a>(
        &'a self,
        resource: &'a Resource,
        identifier: &'a str,
    ) -> BoxFuture<'a, ReconcileResult<()>> {
        Box::pin(self.delete_resource(resource, identifier))
    }
}
