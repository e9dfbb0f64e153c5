//! Effect - A single side effect to perform against a Provider

use std::fmt;

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Create(Resource),
    /// Full overwrite of `from` with `to`
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    Delete {
        resource: Resource,
        identifier: String,
    },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } => id,
            Effect::Delete { resource, .. } => &resource.id,
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Create(resource) => write!(f, "+ {}", resource.id),
            Effect::Update {
                id,
                changed_attributes,
                ..
            } => write!(f, "~ {} ({})", id, changed_attributes.join(", ")),
            Effect::Delete { resource, .. } => write!(f, "- {}", resource.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_marks_operation() {
        let create = Effect::Create(Resource::new("db_security_group", "web"));
        assert_eq!(create.to_string(), "+ db_security_group.web");

        let delete = Effect::Delete {
            resource: Resource::new("db_security_group", "web"),
            identifier: "web".to_string(),
        };
        assert_eq!(delete.to_string(), "- db_security_group.web");
        assert_eq!(delete.resource_id().name, "web");
    }
}
