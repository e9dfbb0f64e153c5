//! In-memory stand-ins for the AWS facades, counting every call

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tideline_core::error::RemoteError;

use crate::api::{
    AUTHORIZE_DB_SECURITY_GROUP_INGRESS, CREATE_DB_SECURITY_GROUP, DELETE_DB_SECURITY_GROUP,
    DELETE_SCHEDULED_ACTION, DbSecurityGroupApi, DbSecurityGroupRecord, Ec2SecurityGroupRecord,
    IpRangeRecord, ScheduledActionApi,
};
use crate::db_security_group::{IngressRule, STATUS_AUTHORIZED, STATUS_AUTHORIZING};
use crate::scheduled_action::ScheduledAction;

pub const OWNER_ID: &str = "123456789012";

#[derive(Default)]
pub struct FakeAutoscaling {
    actions: Mutex<Vec<ScheduledAction>>,
    next_put_error: Mutex<Option<RemoteError>>,
    drop_puts: AtomicBool,
    put_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl FakeAutoscaling {
    /// Store an action as-is, even if one with the same key exists
    pub fn insert_raw(&self, action: ScheduledAction) {
        self.actions.lock().unwrap().push(action);
    }

    pub fn stored(&self, group_name: &str, action_name: &str) -> Option<ScheduledAction> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.autoscaling_group_name == group_name && a.scheduled_action_name == action_name)
            .cloned()
    }

    pub fn fail_next_put(&self, error: RemoteError) {
        *self.next_put_error.lock().unwrap() = Some(error);
    }

    /// Accept puts without storing them
    pub fn drop_puts(&self) {
        self.drop_puts.store(true, Ordering::SeqCst);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduledActionApi for FakeAutoscaling {
    async fn put_scheduled_update_group_action(
        &self,
        action: &ScheduledAction,
    ) -> Result<(), RemoteError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_put_error.lock().unwrap().take() {
            return Err(error);
        }
        if self.drop_puts.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut actions = self.actions.lock().unwrap();
        actions.retain(|a| {
            a.autoscaling_group_name != action.autoscaling_group_name
                || a.scheduled_action_name != action.scheduled_action_name
        });
        actions.push(action.clone());
        Ok(())
    }

    async fn describe_scheduled_actions(
        &self,
        group_name: &str,
        action_names: &[&str],
    ) -> Result<Vec<ScheduledAction>, RemoteError> {
        Ok(self
            .actions
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.autoscaling_group_name == group_name)
            .filter(|a| action_names.contains(&a.scheduled_action_name.as_str()))
            .cloned()
            .collect())
    }

    async fn delete_scheduled_action(
        &self,
        group_name: &str,
        action_name: &str,
    ) -> Result<(), RemoteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        let mut actions = self.actions.lock().unwrap();
        let before = actions.len();
        actions.retain(|a| {
            a.autoscaling_group_name != group_name || a.scheduled_action_name != action_name
        });
        if actions.len() == before {
            return Err(RemoteError::not_found(
                DELETE_SCHEDULED_ACTION,
                format!("Scheduled action {} not found", action_name),
            ));
        }
        Ok(())
    }
}

/// RDS stand-in. Newly authorized rules report `authorizing` for a
/// configurable number of describe calls, then all flip to `authorized`.
pub struct FakeRds {
    groups: Mutex<HashMap<String, DbSecurityGroupRecord>>,
    authorizing_samples: AtomicUsize,
    duplicate_describe: bool,
    foreign_describe: Option<String>,
    failing_rules: Mutex<HashSet<String>>,
    create_calls: AtomicUsize,
    authorize_calls: AtomicUsize,
    describe_calls: AtomicUsize,
}

impl Default for FakeRds {
    fn default() -> Self {
        Self {
            groups: Mutex::new(HashMap::new()),
            authorizing_samples: AtomicUsize::new(0),
            duplicate_describe: false,
            foreign_describe: None,
            failing_rules: Mutex::new(HashSet::new()),
            create_calls: AtomicUsize::new(0),
            authorize_calls: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeRds {
    /// Number of describe calls that still see pending rules
    pub fn with_authorizing_samples(self, samples: usize) -> Self {
        self.authorizing_samples.store(samples, Ordering::SeqCst);
        self
    }

    /// Every describe returns the group twice
    pub fn with_duplicate_describe(mut self) -> Self {
        self.duplicate_describe = true;
        self
    }

    /// Every describe answers with one group named `name`, whatever was asked
    pub fn with_foreign_describe(mut self, name: &str) -> Self {
        self.foreign_describe = Some(name.to_string());
        self
    }

    /// Authorizing a rule whose CIDR or peer group name is `key` fails
    pub fn fail_authorize_for(&self, key: &str) {
        self.failing_rules.lock().unwrap().insert(key.to_string());
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.groups.lock().unwrap().contains_key(name)
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    fn settle(&self, record: &mut DbSecurityGroupRecord) {
        let pending = record.statuses().any(|s| s == STATUS_AUTHORIZING);
        if !pending {
            return;
        }
        let remaining = self.authorizing_samples.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.authorizing_samples.store(remaining - 1, Ordering::SeqCst);
            }
            return;
        }
        for range in &mut record.ip_ranges {
            range.status = STATUS_AUTHORIZED.to_string();
        }
        for group in &mut record.ec2_security_groups {
            group.status = STATUS_AUTHORIZED.to_string();
        }
    }
}

#[async_trait]
impl DbSecurityGroupApi for FakeRds {
    async fn create_db_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<(), RemoteError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut groups = self.groups.lock().unwrap();
        if groups.contains_key(name) {
            return Err(RemoteError::conflict(
                CREATE_DB_SECURITY_GROUP,
                format!("DBSecurityGroupAlreadyExists: {}", name),
            ));
        }
        groups.insert(
            name.to_string(),
            DbSecurityGroupRecord {
                name: name.to_string(),
                description: description.to_string(),
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn describe_db_security_groups(
        &self,
        name: &str,
    ) -> Result<Vec<DbSecurityGroupRecord>, RemoteError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(foreign) = &self.foreign_describe {
            return Ok(vec![DbSecurityGroupRecord {
                name: foreign.clone(),
                description: "someone else's group".to_string(),
                ..Default::default()
            }]);
        }
        let mut groups = self.groups.lock().unwrap();
        let Some(record) = groups.get_mut(name) else {
            return Ok(Vec::new());
        };
        self.settle(record);

        let copies = if self.duplicate_describe { 2 } else { 1 };
        Ok(vec![record.clone(); copies])
    }

    async fn authorize_db_security_group_ingress(
        &self,
        group_name: &str,
        rule: &IngressRule,
    ) -> Result<(), RemoteError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);

        let keys = [rule.cidr.as_deref(), rule.security_group_name.as_deref()];
        let failing = self.failing_rules.lock().unwrap();
        if keys.iter().flatten().any(|k| failing.contains(*k)) {
            return Err(RemoteError::fatal(
                AUTHORIZE_DB_SECURITY_GROUP_INGRESS,
                format!("AuthorizationQuotaExceeded: {}", group_name),
            ));
        }
        drop(failing);

        let mut groups = self.groups.lock().unwrap();
        let record = groups.get_mut(group_name).ok_or_else(|| {
            RemoteError::not_found(
                AUTHORIZE_DB_SECURITY_GROUP_INGRESS,
                format!("DBSecurityGroupNotFound: {}", group_name),
            )
        })?;

        if let Some(cidr) = &rule.cidr {
            record.ip_ranges.push(IpRangeRecord {
                cidr: cidr.clone(),
                status: STATUS_AUTHORIZING.to_string(),
            });
        }
        if rule.security_group_name.is_some() || rule.security_group_id.is_some() {
            let name = rule.security_group_name.clone();
            record.ec2_security_groups.push(Ec2SecurityGroupRecord {
                id: rule
                    .security_group_id
                    .clone()
                    .or_else(|| name.as_ref().map(|n| format!("sg-{}", n))),
                owner_id: rule
                    .security_group_owner_id
                    .clone()
                    .or_else(|| Some(OWNER_ID.to_string())),
                name,
                status: STATUS_AUTHORIZING.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_db_security_group(&self, name: &str) -> Result<(), RemoteError> {
        match self.groups.lock().unwrap().remove(name) {
            Some(_) => Ok(()),
            None => Err(RemoteError::not_found(
                DELETE_DB_SECURITY_GROUP,
                format!("DBSecurityGroupNotFound: {}", name),
            )),
        }
    }
}
