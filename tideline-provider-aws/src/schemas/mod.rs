//! AWS resource schema definitions

pub mod autoscaling;
pub mod rds;

use tideline_core::schema::ResourceSchema;

/// Returns all AWS schemas
pub fn all_schemas() -> Vec<ResourceSchema> {
    let mut schemas = Vec::new();
    schemas.extend(autoscaling::schemas());
    schemas.extend(rds::schemas());
    schemas
}
