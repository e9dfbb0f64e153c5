//! Remote API facades
//!
//! Reconcilers talk to AWS only through these traits. Implementations are
//! stateless apart from their client handle and are shared behind `Arc`.
//! The SDK-backed implementations live in [`crate::sdk`].

use async_trait::async_trait;
use tideline_core::error::RemoteError;

use crate::db_security_group::IngressRule;
use crate::scheduled_action::ScheduledAction;

pub const PUT_SCHEDULED_UPDATE_GROUP_ACTION: &str = "PutScheduledUpdateGroupAction";
pub const DESCRIBE_SCHEDULED_ACTIONS: &str = "DescribeScheduledActions";
pub const DELETE_SCHEDULED_ACTION: &str = "DeleteScheduledAction";

pub const CREATE_DB_SECURITY_GROUP: &str = "CreateDBSecurityGroup";
pub const DESCRIBE_DB_SECURITY_GROUPS: &str = "DescribeDBSecurityGroups";
pub const AUTHORIZE_DB_SECURITY_GROUP_INGRESS: &str = "AuthorizeDBSecurityGroupIngress";
pub const DELETE_DB_SECURITY_GROUP: &str = "DeleteDBSecurityGroup";

/// Auto Scaling scheduled update group actions
#[async_trait]
pub trait ScheduledActionApi: Send + Sync {
    /// Upsert keyed by (group, name). Fields left `None` revert to their
    /// remote defaults.
    async fn put_scheduled_update_group_action(
        &self,
        action: &ScheduledAction,
    ) -> Result<(), RemoteError>;

    /// Actions of `group_name` whose names are in `action_names`
    async fn describe_scheduled_actions(
        &self,
        group_name: &str,
        action_names: &[&str],
    ) -> Result<Vec<ScheduledAction>, RemoteError>;

    async fn delete_scheduled_action(
        &self,
        group_name: &str,
        action_name: &str,
    ) -> Result<(), RemoteError>;
}

/// RDS DB security groups
#[async_trait]
pub trait DbSecurityGroupApi: Send + Sync {
    async fn create_db_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), RemoteError>;

    /// Groups named `name`; an unknown name yields an empty list
    async fn describe_db_security_groups(
        &self,
        name: &str,
    ) -> Result<Vec<DbSecurityGroupRecord>, RemoteError>;

    async fn authorize_db_security_group_ingress(
        &self,
        group_name: &str,
        rule: &IngressRule,
    ) -> Result<(), RemoteError>;

    async fn delete_db_security_group(&self, name: &str) -> Result<(), RemoteError>;
}

/// A DB security group as described by RDS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbSecurityGroupRecord {
    pub name: String,
    pub description: String,
    pub ip_ranges: Vec<IpRangeRecord>,
    pub ec2_security_groups: Vec<Ec2SecurityGroupRecord>,
}

impl DbSecurityGroupRecord {
    /// Authorization status of every ingress entry
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.ip_ranges
            .iter()
            .map(|r| r.status.as_str())
            .chain(self.ec2_security_groups.iter().map(|g| g.status.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRangeRecord {
    pub cidr: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ec2SecurityGroupRecord {
    pub name: Option<String>,
    pub id: Option<String>,
    pub owner_id: Option<String>,
    pub status: String,
}
