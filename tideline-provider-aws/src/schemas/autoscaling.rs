//! Auto Scaling scheduled action schema definition

use tideline_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::scheduled_action::RESOURCE_TYPE;

/// Returns the schema for scheduled update group actions
pub fn scheduled_action_schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("A scheduled capacity change of an Auto Scaling group")
        .attribute(
            AttributeSchema::new("autoscaling_group_name", AttributeType::String)
                .required()
                .create_only()
                .with_description("The Auto Scaling group the action belongs to"),
        )
        .attribute(
            AttributeSchema::new("scheduled_action_name", AttributeType::String)
                .required()
                .create_only()
                .with_description("Name of the action, unique within its group"),
        )
        .attribute(
            AttributeSchema::new("desired_capacity", AttributeType::Int)
                .with_description("Number of instances the group should run"),
        )
        .attribute(AttributeSchema::new("min_size", AttributeType::Int))
        .attribute(AttributeSchema::new("max_size", AttributeType::Int))
        .attribute(
            AttributeSchema::new("recurrence", AttributeType::String)
                .with_description("Cron expression of a recurring schedule"),
        )
        .attribute(
            AttributeSchema::new("start_time", AttributeType::Timestamp)
                .with_description("RFC3339 time of the first (or only) run"),
        )
        .attribute(AttributeSchema::new("end_time", AttributeType::Timestamp))
}

/// Returns all Auto Scaling schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![scheduled_action_schema()]
}
