//! RDS DB security group schema definition

use tideline_core::schema::{AttributeSchema, AttributeType, ResourceSchema, cidr_block};

use crate::db_security_group::RESOURCE_TYPE;

/// One ingress rule: a CIDR range or a peer EC2 security group
fn ingress_rule_block() -> AttributeType {
    AttributeType::Block(vec![
        AttributeSchema::new("cidr", cidr_block()),
        AttributeSchema::new("security_group_name", AttributeType::String),
        AttributeSchema::new("security_group_id", AttributeType::String),
        AttributeSchema::new("security_group_owner_id", AttributeType::String),
    ])
}

/// Returns the schema for DB security groups
pub fn db_security_group_schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("An RDS DB security group; every attribute is fixed at creation")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .create_only(),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .required()
                .create_only(),
        )
        .attribute(
            AttributeSchema::new("ingress", AttributeType::Set(Box::new(ingress_rule_block())))
                .create_only()
                .with_description("Ingress rules authorized after the group is created"),
        )
}

/// Returns all RDS schemas
pub fn schemas() -> Vec<ResourceSchema> {
    vec![db_security_group_schema()]
}
