//! DesiredConfig - Typed, read-only view over validated desired attributes
//!
//! An attribute is either unset (`None`, meaning "use the remote default" and
//! omit it from requests) or explicitly set, in which case a zero value is
//! still `Some(0)`. Looking up a name the schema does not declare, or with an
//! accessor of the wrong type, is a validation error.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{ReconcileError, ReconcileResult};
use crate::resource::{ResourceId, Value};
use crate::schema::{AttributeType, ResourceSchema};

#[derive(Debug, Clone)]
pub struct DesiredConfig<'s> {
    id: ResourceId,
    schema: &'s ResourceSchema,
    attributes: HashMap<String, Value>,
}

impl<'s> DesiredConfig<'s> {
    /// Wrap attributes already checked by [`ResourceSchema::validate`]
    pub(crate) fn new(
        id: ResourceId,
        schema: &'s ResourceSchema,
        attributes: HashMap<String, Value>,
    ) -> Self {
        Self {
            id,
            schema,
            attributes,
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn schema(&self) -> &ResourceSchema {
        self.schema
    }

    /// Whether the attribute was explicitly set
    pub fn is_set(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn get_string(&self, name: &str) -> ReconcileResult<Option<&str>> {
        self.check_type(name, "String", is_string_type)?;
        Ok(self.attributes.get(name).and_then(Value::as_str))
    }

    /// Like [`get_string`](Self::get_string), but unset is a validation error
    pub fn require_string(&self, name: &str) -> ReconcileResult<&str> {
        self.get_string(name)?.ok_or_else(|| {
            ReconcileError::validation(
                &self.id,
                format!("Required attribute '{}' is missing", name),
            )
        })
    }

    pub fn get_int(&self, name: &str) -> ReconcileResult<Option<i64>> {
        self.check_type(name, "Int", is_int_type)?;
        Ok(self.attributes.get(name).and_then(Value::as_int))
    }

    /// Parse an RFC3339 attribute into an absolute instant
    pub fn get_timestamp(&self, name: &str) -> ReconcileResult<Option<DateTime<Utc>>> {
        self.check_type(name, "Timestamp", |t| {
            matches!(t, AttributeType::Timestamp)
        })?;
        let Some(raw) = self.attributes.get(name).and_then(Value::as_str) else {
            return Ok(None);
        };
        DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| {
                ReconcileError::validation(
                    &self.id,
                    format!("Attribute '{}': invalid RFC3339 timestamp '{}': {}", name, raw, e),
                )
            })
    }

    /// Elements of a list- or set-of-blocks attribute; empty when unset
    pub fn get_blocks(&self, name: &str) -> ReconcileResult<Vec<Block<'_>>> {
        self.check_type(name, "List<Block>", |t| match t {
            AttributeType::List(inner) | AttributeType::Set(inner) => {
                matches!(**inner, AttributeType::Block(_))
            }
            _ => false,
        })?;

        let Some(Value::List(items)) = self.attributes.get(name) else {
            return Ok(Vec::new());
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Map(fields) => Ok(Block { index, fields }),
                other => Err(ReconcileError::validation(
                    &self.id,
                    format!(
                        "Attribute '{}' item {}: expected Block, got {}",
                        name,
                        index,
                        other.type_name()
                    ),
                )),
            })
            .collect()
    }

    fn check_type(
        &self,
        name: &str,
        expected: &str,
        accepts: impl Fn(&AttributeType) -> bool,
    ) -> ReconcileResult<()> {
        let attr = self.schema.attributes.get(name).ok_or_else(|| {
            ReconcileError::validation(
                &self.id,
                format!(
                    "Unknown attribute '{}' for {}",
                    name, self.schema.resource_type
                ),
            )
        })?;
        if accepts(&attr.attr_type) {
            Ok(())
        } else {
            Err(ReconcileError::validation(
                &self.id,
                format!(
                    "Attribute '{}' is {}, not {}",
                    name, attr.attr_type, expected
                ),
            ))
        }
    }
}

fn is_string_type(t: &AttributeType) -> bool {
    match t {
        AttributeType::String => true,
        AttributeType::Custom { base, .. } => is_string_type(base),
        _ => false,
    }
}

fn is_int_type(t: &AttributeType) -> bool {
    match t {
        AttributeType::Int => true,
        AttributeType::Custom { base, .. } => is_int_type(base),
        _ => false,
    }
}

/// One element of a block collection
#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub index: usize,
    fields: &'a HashMap<String, Value>,
}

impl<'a> Block<'a> {
    pub fn get_string(&self, key: &str) -> Option<&'a str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
