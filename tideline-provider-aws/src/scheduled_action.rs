//! Auto Scaling scheduled update group actions
//!
//! An action is addressed by (group name, action name). Put is an upsert
//! that replaces every field, so create and update share one code path and
//! unset fields revert to AWS defaults instead of keeping prior values.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use tideline_core::desired::DesiredConfig;
use tideline_core::error::{ReconcileError, ReconcileResult};
use tideline_core::resource::{ResourceId, State, Value};

use crate::api::{DESCRIBE_SCHEDULED_ACTIONS, ScheduledActionApi};

pub const RESOURCE_TYPE: &str = "autoscaling_scheduled_action";

/// A scheduled action as sent to and described by Auto Scaling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduledAction {
    pub autoscaling_group_name: String,
    pub scheduled_action_name: String,
    pub desired_capacity: Option<i32>,
    pub min_size: Option<i32>,
    pub max_size: Option<i32>,
    pub recurrence: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ScheduledAction {
    /// Build the Put request from desired attributes.
    ///
    /// Only explicitly set fields are carried; zero is kept as zero.
    pub fn from_desired(desired: &DesiredConfig<'_>) -> ReconcileResult<Self> {
        Ok(Self {
            autoscaling_group_name: desired.require_string("autoscaling_group_name")?.to_string(),
            scheduled_action_name: desired.require_string("scheduled_action_name")?.to_string(),
            desired_capacity: capacity(desired, "desired_capacity")?,
            min_size: capacity(desired, "min_size")?,
            max_size: capacity(desired, "max_size")?,
            recurrence: desired.get_string("recurrence")?.map(str::to_string),
            start_time: desired.get_timestamp("start_time")?,
            end_time: desired.get_timestamp("end_time")?,
        })
    }

    /// Attributes of the described action; unset fields are omitted
    pub fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert(
            "autoscaling_group_name".to_string(),
            Value::String(self.autoscaling_group_name.clone()),
        );
        attributes.insert(
            "scheduled_action_name".to_string(),
            Value::String(self.scheduled_action_name.clone()),
        );

        let ints = [
            ("desired_capacity", self.desired_capacity),
            ("min_size", self.min_size),
            ("max_size", self.max_size),
        ];
        for (name, value) in ints {
            if let Some(v) = value {
                attributes.insert(name.to_string(), Value::Int(i64::from(v)));
            }
        }

        if let Some(recurrence) = &self.recurrence {
            attributes.insert("recurrence".to_string(), Value::String(recurrence.clone()));
        }
        for (name, value) in [("start_time", self.start_time), ("end_time", self.end_time)] {
            if let Some(t) = value {
                attributes.insert(
                    name.to_string(),
                    Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true)),
                );
            }
        }

        attributes
    }

    pub fn to_state(&self, id: ResourceId) -> State {
        State::existing(id, self.to_attributes()).with_identifier(&self.scheduled_action_name)
    }
}

/// Capacities are 32-bit and non-negative on the remote side
fn capacity(desired: &DesiredConfig<'_>, name: &str) -> ReconcileResult<Option<i32>> {
    let Some(value) = desired.get_int(name)? else {
        return Ok(None);
    };
    i32::try_from(value)
        .ok()
        .filter(|v| *v >= 0)
        .map(Some)
        .ok_or_else(|| {
            ReconcileError::validation(
                desired.id(),
                format!("Attribute '{}': {} is outside 0..={}", name, value, i32::MAX),
            )
        })
}

/// Reconciler for `autoscaling_scheduled_action`
pub struct ScheduledActionReconciler {
    api: Arc<dyn ScheduledActionApi>,
}

impl ScheduledActionReconciler {
    pub fn new(api: Arc<dyn ScheduledActionApi>) -> Self {
        Self { api }
    }

    /// Put the action, then read it back.
    ///
    /// An existing action with the same (group, name) is overwritten.
    pub async fn create(&self, desired: &DesiredConfig<'_>) -> ReconcileResult<ScheduledAction> {
        let action = ScheduledAction::from_desired(desired)?;
        self.put(desired.id(), &action).await
    }

    pub async fn read(
        &self,
        id: &ResourceId,
        group_name: &str,
        action_name: &str,
    ) -> ReconcileResult<Option<ScheduledAction>> {
        let mut matches: Vec<ScheduledAction> = self
            .api
            .describe_scheduled_actions(group_name, &[action_name])
            .await
            .map_err(|e| ReconcileError::remote(id, e))?
            .into_iter()
            .filter(|a| a.scheduled_action_name == action_name)
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            n => Err(ReconcileError::consistency(
                id,
                DESCRIBE_SCHEDULED_ACTIONS,
                action_name,
                n,
            )),
        }
    }

    /// Overwrite the action addressed by (`group_name`, `action_name`).
    ///
    /// The identity itself cannot move; changing either name is rejected
    /// before any remote call.
    pub async fn update(
        &self,
        group_name: &str,
        action_name: &str,
        desired: &DesiredConfig<'_>,
    ) -> ReconcileResult<ScheduledAction> {
        let action = ScheduledAction::from_desired(desired)?;
        let moved: Vec<&str> = [
            (
                "autoscaling_group_name",
                action.autoscaling_group_name.as_str(),
                group_name,
            ),
            (
                "scheduled_action_name",
                action.scheduled_action_name.as_str(),
                action_name,
            ),
        ]
        .into_iter()
        .filter(|(_, wanted, current)| wanted != current)
        .map(|(attr, _, _)| attr)
        .collect();

        if !moved.is_empty() {
            return Err(ReconcileError::validation(
                desired.id(),
                format!(
                    "{} cannot change after creation; delete and recreate instead",
                    moved.join(", ")
                ),
            ));
        }

        self.put(desired.id(), &action).await
    }

    /// Delete the action; an action that is already gone counts as deleted
    pub async fn delete(
        &self,
        id: &ResourceId,
        group_name: &str,
        action_name: &str,
    ) -> ReconcileResult<()> {
        if self.read(id, group_name, action_name).await?.is_none() {
            debug!("Scheduled action {} already absent", action_name);
            return Ok(());
        }

        match self
            .api
            .delete_scheduled_action(group_name, action_name)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ReconcileError::remote(id, e)),
        }
    }

    async fn put(&self, id: &ResourceId, action: &ScheduledAction) -> ReconcileResult<ScheduledAction> {
        debug!("AutoScaling Scheduled Action create configuration: {:?}", action);
        self.api
            .put_scheduled_update_group_action(action)
            .await
            .map_err(|e| ReconcileError::remote(id, e))?;
        info!("Scheduled action ID: {}", action.scheduled_action_name);

        self.read(id, &action.autoscaling_group_name, &action.scheduled_action_name)
            .await?
            .ok_or_else(|| {
                ReconcileError::consistency(
                    id,
                    DESCRIBE_SCHEDULED_ACTIONS,
                    &action.scheduled_action_name,
                    0,
                )
            })
    }
}
