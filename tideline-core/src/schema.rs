//! Schema - Define type schemas for resources
//!
//! Providers define a schema for each resource type. Desired attributes are
//! validated against it once, at the boundary, before a reconciler sees them.

use std::collections::HashMap;
use std::fmt;

use chrono::DateTime;

use crate::desired::DesiredConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::resource::{Resource, Value};

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// RFC3339 timestamp, written as a string
    Timestamp,
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered collection; elements are compared by content, not position
    Set(Box<AttributeType>),
    /// Nested block with its own attribute schemas
    Block(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Timestamp, Value::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .map_err(|e| TypeError::InvalidTimestamp {
                    value: s.clone(),
                    reason: e.to_string(),
                }),

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner) | AttributeType::Set(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Block(fields), Value::Map(map)) => {
                for (key, v) in map {
                    let field = fields.iter().find(|f| &f.name == key).ok_or_else(|| {
                        TypeError::UnknownAttribute { name: key.clone() }
                    })?;
                    field
                        .attr_type
                        .validate(v)
                        .map_err(|e| TypeError::BlockFieldError {
                            key: key.clone(),
                            inner: Box::new(e),
                        })?;
                }
                if let Some(missing) = fields
                    .iter()
                    .find(|f| f.required && !map.contains_key(&f.name))
                {
                    return Err(TypeError::MissingRequired {
                        name: missing.name.clone(),
                    });
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name().to_string(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Timestamp => "Timestamp".to_string(),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Block(_) => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid RFC3339 timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("Block field '{key}': {inner}")]
    BlockFieldError { key: String, inner: Box<TypeError> },
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Can only be set at creation; any later change needs delete and recreate
    pub create_only: bool,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            create_only: false,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn create_only(mut self) -> Self {
        self.create_only = true;
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Check each declared attribute
        for (name, value) in attributes {
            match self.attributes.get(name) {
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(TypeError::AttributeError {
                            name: name.clone(),
                            inner: Box::new(e),
                        });
                    }
                }
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate a resource and wrap it in a typed view.
    ///
    /// Every type error is reported together in one validation error.
    pub fn bind(&self, resource: &Resource) -> ReconcileResult<DesiredConfig<'_>> {
        if resource.id.resource_type != self.resource_type {
            return Err(ReconcileError::validation(
                &resource.id,
                format!(
                    "Resource type mismatch: schema is for '{}'",
                    self.resource_type
                ),
            ));
        }

        self.validate(&resource.attributes).map_err(|errors| {
            let mut messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            messages.sort();
            ReconcileError::validation(&resource.id, messages.join("; "))
        })?;

        Ok(DesiredConfig::new(
            resource.id.clone(),
            self,
            resource.attributes.clone(),
        ))
    }

    /// Names of attributes that cannot change after creation
    pub fn create_only_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.create_only)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }
}

/// IPv4 CIDR block type (with validation)
pub fn cidr_block() -> AttributeType {
    AttributeType::Custom {
        name: "CidrBlock".to_string(),
        base: Box::new(AttributeType::String),
        validate: |value| {
            if let Value::String(s) = value {
                let parts: Vec<&str> = s.split('/').collect();
                if parts.len() != 2 {
                    return Err("CIDR block must be in format x.x.x.x/n".to_string());
                }
                let ip_parts: Vec<&str> = parts[0].split('.').collect();
                if ip_parts.len() != 4 || ip_parts.iter().any(|p| p.parse::<u8>().is_err()) {
                    return Err("Invalid IP address in CIDR block".to_string());
                }
                let prefix: u8 = parts[1]
                    .parse()
                    .map_err(|_| "Invalid prefix length in CIDR block".to_string())?;
                if prefix > 32 {
                    return Err("Prefix length must be between 0 and 32".to_string());
                }
                Ok(())
            } else {
                Err("Expected string".to_string())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> ResourceSchema {
        ResourceSchema::new("test")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", AttributeType::Int))
            .attribute(AttributeSchema::new("start_time", AttributeType::Timestamp))
            .attribute(AttributeSchema::new(
                "rules",
                AttributeType::Set(Box::new(AttributeType::Block(vec![
                    AttributeSchema::new("cidr", cidr_block()),
                    AttributeSchema::new("group", AttributeType::String),
                ]))),
            ))
    }

    fn rule(key: &str, value: &str) -> Value {
        let mut map = HashMap::new();
        map.insert(key.to_string(), Value::String(value.to_string()));
        Value::Map(map)
    }

    #[test]
    fn validate_accepts_well_typed_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("web".to_string()));
        attrs.insert("count".to_string(), Value::Int(0));
        attrs.insert(
            "start_time".to_string(),
            Value::String("2030-01-01T00:00:00Z".to_string()),
        );
        attrs.insert(
            "rules".to_string(),
            Value::List(vec![rule("cidr", "10.0.0.0/8"), rule("group", "default")]),
        );

        assert!(test_schema().validate(&attrs).is_ok());
    }

    #[test]
    fn validate_reports_every_error() {
        let mut attrs = HashMap::new();
        attrs.insert("count".to_string(), Value::String("two".to_string()));
        attrs.insert("colour".to_string(), Value::String("red".to_string()));

        let errors = test_schema().validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::MissingRequired { name } if name == "name"))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::UnknownAttribute { name } if name == "colour"))
        );
    }

    #[test]
    fn invalid_timestamp_is_rejected() {
        let err = AttributeType::Timestamp
            .validate(&Value::String("next tuesday".to_string()))
            .unwrap_err();
        assert!(matches!(err, TypeError::InvalidTimestamp { .. }));
    }

    #[test]
    fn block_rejects_unknown_field_and_bad_cidr() {
        let block = AttributeType::Block(vec![AttributeSchema::new("cidr", cidr_block())]);

        assert!(matches!(
            block.validate(&rule("port", "80")),
            Err(TypeError::UnknownAttribute { .. })
        ));
        assert!(matches!(
            block.validate(&rule("cidr", "10.0.0.0/33")),
            Err(TypeError::BlockFieldError { .. })
        ));
    }

    #[test]
    fn bind_wraps_errors_in_validation() {
        let resource = Resource::new("test", "r").with_attribute("count", Value::Int(1));
        let err = test_schema().bind(&resource).unwrap_err();
        assert!(matches!(err, ReconcileError::Validation { .. }));
        assert!(err.to_string().contains("Required attribute 'name' is missing"));
    }

    #[test]
    fn bind_rejects_other_resource_types() {
        let resource =
            Resource::new("other", "r").with_attribute("name", Value::String("x".to_string()));
        assert!(test_schema().bind(&resource).is_err());
    }
}
