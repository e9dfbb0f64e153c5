//! AWS SDK backed facades

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_autoscaling::Client as AutoscalingClient;
use aws_sdk_autoscaling::primitives::DateTime as SmithyDateTime;
use aws_sdk_rds::Client as RdsClient;
use chrono::{DateTime, Utc};
use tideline_core::error::{RemoteError, RemoteErrorKind};

use crate::api::{
    AUTHORIZE_DB_SECURITY_GROUP_INGRESS, CREATE_DB_SECURITY_GROUP, DELETE_DB_SECURITY_GROUP,
    DELETE_SCHEDULED_ACTION, DESCRIBE_DB_SECURITY_GROUPS, DESCRIBE_SCHEDULED_ACTIONS,
    DbSecurityGroupApi, DbSecurityGroupRecord, Ec2SecurityGroupRecord, IpRangeRecord,
    PUT_SCHEDULED_UPDATE_GROUP_ACTION, ScheduledActionApi,
};
use crate::db_security_group::IngressRule;
use crate::scheduled_action::ScheduledAction;

/// Load shared SDK configuration (credentials chain) for `region`
pub async fn load_config(region: &str) -> SdkConfig {
    aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Classify an SDK error by the error code in its debug rendering
pub fn classify_sdk_error<E: std::fmt::Debug>(operation: &str, err: &E) -> RemoteError {
    let raw = format!("{:?}", err);
    RemoteError::new(classify(&raw), operation, raw)
}

fn classify(raw: &str) -> RemoteErrorKind {
    const CONFLICT: [&str; 3] = [
        "AlreadyExist",
        "ResourceInUse",
        "InvalidDBSecurityGroupState",
    ];
    const TRANSIENT: [&str; 6] = [
        "Throttl",
        "RequestLimitExceeded",
        "ResourceContention",
        "ServiceUnavailable",
        "TimeoutError",
        "DispatchFailure",
    ];

    if raw.contains("NotFound") {
        RemoteErrorKind::NotFound
    } else if CONFLICT.iter().any(|code| raw.contains(code)) {
        RemoteErrorKind::Conflict
    } else if TRANSIENT.iter().any(|code| raw.contains(code)) {
        RemoteErrorKind::Transient
    } else {
        RemoteErrorKind::Fatal
    }
}

fn to_smithy_time(t: DateTime<Utc>) -> SmithyDateTime {
    SmithyDateTime::from_secs_and_nanos(t.timestamp(), t.timestamp_subsec_nanos())
}

fn from_smithy_time(t: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

/// Auto Scaling API
pub struct AutoscalingSdk {
    client: AutoscalingClient,
}

impl AutoscalingSdk {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: AutoscalingClient::new(config),
        }
    }
}

#[async_trait]
impl ScheduledActionApi for AutoscalingSdk {
    async fn put_scheduled_update_group_action(
        &self,
        action: &ScheduledAction,
    ) -> Result<(), RemoteError> {
        self.client
            .put_scheduled_update_group_action()
            .auto_scaling_group_name(&action.autoscaling_group_name)
            .scheduled_action_name(&action.scheduled_action_name)
            .set_desired_capacity(action.desired_capacity)
            .set_min_size(action.min_size)
            .set_max_size(action.max_size)
            .set_recurrence(action.recurrence.clone())
            .set_start_time(action.start_time.map(to_smithy_time))
            .set_end_time(action.end_time.map(to_smithy_time))
            .send()
            .await
            .map_err(|e| classify_sdk_error(PUT_SCHEDULED_UPDATE_GROUP_ACTION, &e))?;
        Ok(())
    }

    async fn describe_scheduled_actions(
        &self,
        group_name: &str,
        action_names: &[&str],
    ) -> Result<Vec<ScheduledAction>, RemoteError> {
        let result = self
            .client
            .describe_scheduled_actions()
            .auto_scaling_group_name(group_name)
            .set_scheduled_action_names(Some(
                action_names.iter().map(|n| n.to_string()).collect(),
            ))
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = classify_sdk_error(DESCRIBE_SCHEDULED_ACTIONS, &e);
                if err.is_not_found() {
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };

        Ok(response
            .scheduled_update_group_actions()
            .iter()
            .map(|a| ScheduledAction {
                autoscaling_group_name: a.auto_scaling_group_name().unwrap_or_default().to_string(),
                scheduled_action_name: a.scheduled_action_name().unwrap_or_default().to_string(),
                desired_capacity: a.desired_capacity(),
                min_size: a.min_size(),
                max_size: a.max_size(),
                recurrence: a.recurrence().map(str::to_string),
                start_time: a.start_time().and_then(from_smithy_time),
                end_time: a.end_time().and_then(from_smithy_time),
            })
            .collect())
    }

    async fn delete_scheduled_action(
        &self,
        group_name: &str,
        action_name: &str,
    ) -> Result<(), RemoteError> {
        self.client
            .delete_scheduled_action()
            .auto_scaling_group_name(group_name)
            .scheduled_action_name(action_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(DELETE_SCHEDULED_ACTION, &e))?;
        Ok(())
    }
}

/// RDS API
pub struct RdsSdk {
    client: RdsClient,
}

impl RdsSdk {
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: RdsClient::new(config),
        }
    }
}

#[async_trait]
impl DbSecurityGroupApi for RdsSdk {
    async fn create_db_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), RemoteError> {
        self.client
            .create_db_security_group()
            .db_security_group_name(name)
            .db_security_group_description(description)
            .send()
            .await
            .map_err(|e| classify_sdk_error(CREATE_DB_SECURITY_GROUP, &e))?;
        Ok(())
    }

    async fn describe_db_security_groups(
        &self,
        name: &str,
    ) -> Result<Vec<DbSecurityGroupRecord>, RemoteError> {
        let result = self
            .client
            .describe_db_security_groups()
            .db_security_group_name(name)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                let err = classify_sdk_error(DESCRIBE_DB_SECURITY_GROUPS, &e);
                if err.is_not_found() {
                    return Ok(Vec::new());
                }
                return Err(err);
            }
        };

        Ok(response
            .db_security_groups()
            .iter()
            .map(|g| DbSecurityGroupRecord {
                name: g.db_security_group_name().unwrap_or_default().to_string(),
                description: g
                    .db_security_group_description()
                    .unwrap_or_default()
                    .to_string(),
                ip_ranges: g
                    .ip_ranges()
                    .iter()
                    .map(|r| IpRangeRecord {
                        cidr: r.cidrip().unwrap_or_default().to_string(),
                        status: r.status().unwrap_or_default().to_string(),
                    })
                    .collect(),
                ec2_security_groups: g
                    .ec2_security_groups()
                    .iter()
                    .map(|s| Ec2SecurityGroupRecord {
                        name: s.ec2_security_group_name().map(str::to_string),
                        id: s.ec2_security_group_id().map(str::to_string),
                        owner_id: s.ec2_security_group_owner_id().map(str::to_string),
                        status: s.status().unwrap_or_default().to_string(),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn authorize_db_security_group_ingress(
        &self,
        group_name: &str,
        rule: &IngressRule,
    ) -> Result<(), RemoteError> {
        self.client
            .authorize_db_security_group_ingress()
            .db_security_group_name(group_name)
            .set_cidrip(rule.cidr.clone())
            .set_ec2_security_group_name(rule.security_group_name.clone())
            .set_ec2_security_group_id(rule.security_group_id.clone())
            .set_ec2_security_group_owner_id(rule.security_group_owner_id.clone())
            .send()
            .await
            .map_err(|e| classify_sdk_error(AUTHORIZE_DB_SECURITY_GROUP_INGRESS, &e))?;
        Ok(())
    }

    async fn delete_db_security_group(&self, name: &str) -> Result<(), RemoteError> {
        self.client
            .delete_db_security_group()
            .db_security_group_name(name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(DELETE_DB_SECURITY_GROUP, &e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_error_codes() {
        assert_eq!(
            classify("ServiceError { source: DbSecurityGroupNotFoundFault(..) }"),
            RemoteErrorKind::NotFound
        );
        assert_eq!(
            classify("ServiceError { code: Some(\"InvalidDBSecurityGroup.NotFound\") }"),
            RemoteErrorKind::NotFound
        );
        assert_eq!(
            classify("DbSecurityGroupAlreadyExistsFault"),
            RemoteErrorKind::Conflict
        );
        assert_eq!(
            classify("code: Some(\"Throttling\"), message: Some(\"Rate exceeded\")"),
            RemoteErrorKind::Transient
        );
        assert_eq!(classify("DispatchFailure(..)"), RemoteErrorKind::Transient);
        assert_eq!(
            classify("AuthorizationQuotaExceededFault"),
            RemoteErrorKind::Fatal
        );
    }

    #[test]
    fn classify_sdk_error_keeps_operation() {
        let err = classify_sdk_error(DELETE_DB_SECURITY_GROUP, &"DBSecurityGroupNotFound");
        assert_eq!(err.operation, DELETE_DB_SECURITY_GROUP);
        assert!(err.is_not_found());
    }

    #[test]
    fn smithy_time_round_trip() {
        let t = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(from_smithy_time(&to_smithy_time(t)), Some(t));
    }
}
