//! Differ - Compare desired state with current state to generate a Plan
//!
//! Updates are full overwrites: an attribute that exists remotely but is
//! omitted from the desired state reverts to its remote default, so it is
//! reported as a change rather than silently kept.

use std::collections::HashMap;

use chrono::DateTime;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::{AttributeType, ResourceSchema};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed schema attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let mut changed: Vec<String> = schema
        .attributes
        .values()
        .filter(|attr| {
            match (desired.get(&attr.name), current.get(&attr.name)) {
                (Some(d), Some(c)) => !values_match(&attr.attr_type, d, c),
                (None, None) => false,
                // Set on one side only; omission reverts to the remote default
                _ => true,
            }
        })
        .map(|attr| attr.name.clone())
        .collect();
    changed.sort();
    changed
}

fn values_match(attr_type: &AttributeType, desired: &Value, current: &Value) -> bool {
    match (attr_type, desired, current) {
        // Membership only; repeated desired elements collapse into one remote member
        (AttributeType::Set(_), Value::List(d), Value::List(c)) => {
            d.iter().all(|x| c.iter().any(|y| element_matches(x, y)))
                && c.iter().all(|y| d.iter().any(|x| element_matches(x, y)))
        }
        // Same instant in a different offset is not a change
        (AttributeType::Timestamp, Value::String(d), Value::String(c)) => {
            match (DateTime::parse_from_rfc3339(d), DateTime::parse_from_rfc3339(c)) {
                (Ok(d), Ok(c)) => d == c,
                _ => d == c,
            }
        }
        _ => desired == current,
    }
}

/// Block fields the desired element leaves unset may be filled in remotely
fn element_matches(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Map(d), Value::Map(c)) => d.iter().all(|(k, v)| c.get(k) == Some(v)),
        _ => desired == current,
    }
}

/// Compute Diff for multiple resources and generate a Plan
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let d = match schemas.get(&resource.id.resource_type) {
            Some(schema) => diff(resource, &current, schema),
            None => Diff::Create(resource.clone()),
        };

        match d {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    plan
}

/// Plan deletion of every existing resource, in reverse declaration order
pub fn destroy_plan(desired: &[Resource], current_states: &HashMap<ResourceId, State>) -> Plan {
    let mut plan = Plan::new();

    for resource in desired.iter().rev() {
        if let Some(state) = current_states.get(&resource.id)
            && state.exists
            && let Some(identifier) = &state.identifier
        {
            plan.add(Effect::Delete {
                resource: resource.clone(),
                identifier: identifier.clone(),
            });
        }
    }

    plan
}
