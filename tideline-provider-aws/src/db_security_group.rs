//! RDS DB security groups
//!
//! A group is created with a name and description, then each ingress rule
//! is authorized with its own call. Authorizations settle asynchronously, so
//! create only returns once every rule reports `authorized`. Nothing about a
//! group can change after creation.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tideline_core::desired::{Block, DesiredConfig};
use tideline_core::error::{ReconcileError, ReconcileResult, RemoteError};
use tideline_core::fingerprint::{Fingerprint, FingerprintBuilder};
use tideline_core::poller::{PollError, Poller, Sample, WaitConfig, conjunction};
use tideline_core::resource::{ResourceId, State, Value};

use crate::api::{
    AUTHORIZE_DB_SECURITY_GROUP_INGRESS, DESCRIBE_DB_SECURITY_GROUPS, DbSecurityGroupApi,
    DbSecurityGroupRecord,
};

pub const RESOURCE_TYPE: &str = "db_security_group";

pub const STATUS_AUTHORIZING: &str = "authorizing";
pub const STATUS_AUTHORIZED: &str = "authorized";

/// Default number of authorize calls in flight at once
pub const DEFAULT_AUTHORIZE_CONCURRENCY: usize = 4;

const RULE_FIELDS: [&str; 4] = [
    "cidr",
    "security_group_name",
    "security_group_id",
    "security_group_owner_id",
];

/// An ingress rule: a CIDR range, a peer EC2 security group, or both
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IngressRule {
    pub cidr: Option<String>,
    pub security_group_name: Option<String>,
    pub security_group_id: Option<String>,
    pub security_group_owner_id: Option<String>,
}

impl IngressRule {
    pub fn cidr(cidr: impl Into<String>) -> Self {
        Self {
            cidr: Some(cidr.into()),
            ..Default::default()
        }
    }

    pub fn security_group(name: impl Into<String>) -> Self {
        Self {
            security_group_name: Some(name.into()),
            ..Default::default()
        }
    }

    fn fields(&self) -> [Option<&str>; 4] {
        [
            self.cidr.as_deref(),
            self.security_group_name.as_deref(),
            self.security_group_id.as_deref(),
            self.security_group_owner_id.as_deref(),
        ]
    }

    /// Set-membership key over the four identity fields
    pub fn fingerprint(&self) -> Fingerprint {
        RULE_FIELDS
            .iter()
            .zip(self.fields())
            .fold(FingerprintBuilder::new(), |builder, (key, value)| {
                builder.field(key, value)
            })
            .finish()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(Option::is_none)
    }

    fn from_block(id: &ResourceId, block: &Block<'_>) -> ReconcileResult<Self> {
        let rule = Self {
            cidr: block.get_string("cidr").map(str::to_string),
            security_group_name: block.get_string("security_group_name").map(str::to_string),
            security_group_id: block.get_string("security_group_id").map(str::to_string),
            security_group_owner_id: block
                .get_string("security_group_owner_id")
                .map(str::to_string),
        };
        if rule.is_empty() {
            return Err(ReconcileError::validation(
                id,
                format!("ingress rule {} sets none of {}", block.index, RULE_FIELDS.join(", ")),
            ));
        }
        Ok(rule)
    }

    fn to_value(&self) -> Value {
        let fields = RULE_FIELDS
            .iter()
            .zip(self.fields())
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), Value::String(v.to_string()))))
            .collect();
        Value::Map(fields)
    }
}

impl fmt::Display for IngressRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = RULE_FIELDS
            .iter()
            .zip(self.fields())
            .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, v)))
            .collect();
        write!(f, "{{{}}}", fields.join(", "))
    }
}

/// Ingress rules keyed by fingerprint; equal rules collapse into one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngressRuleSet {
    rules: BTreeMap<Fingerprint, IngressRule>,
}

impl IngressRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal rule was already present
    pub fn insert(&mut self, rule: IngressRule) -> bool {
        self.rules.insert(rule.fingerprint(), rule).is_none()
    }

    pub fn contains(&self, rule: &IngressRule) -> bool {
        self.rules.contains_key(&rule.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IngressRule> {
        self.rules.values()
    }
}

impl FromIterator<IngressRule> for IngressRuleSet {
    fn from_iter<I: IntoIterator<Item = IngressRule>>(iter: I) -> Self {
        let mut set = Self::new();
        for rule in iter {
            set.insert(rule);
        }
        set
    }
}

/// A DB security group and its ingress rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbSecurityGroup {
    pub name: String,
    pub description: String,
    pub ingress: IngressRuleSet,
}

impl DbSecurityGroup {
    /// Rebuild from a described group; fingerprints are recomputed
    pub fn from_record(record: &DbSecurityGroupRecord) -> Self {
        let ranges = record.ip_ranges.iter().map(|r| IngressRule::cidr(&r.cidr));
        let peers = record.ec2_security_groups.iter().map(|g| IngressRule {
            cidr: None,
            security_group_name: g.name.clone(),
            security_group_id: g.id.clone(),
            security_group_owner_id: g.owner_id.clone(),
        });
        Self {
            name: record.name.clone(),
            description: record.description.clone(),
            ingress: ranges.chain(peers).collect(),
        }
    }

    pub fn to_attributes(&self) -> HashMap<String, Value> {
        let mut attributes = HashMap::new();
        attributes.insert("name".to_string(), Value::String(self.name.clone()));
        attributes.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        attributes.insert(
            "ingress".to_string(),
            Value::List(self.ingress.iter().map(IngressRule::to_value).collect()),
        );
        attributes
    }

    pub fn to_state(&self, id: ResourceId) -> State {
        State::existing(id, self.to_attributes()).with_identifier(&self.name)
    }
}

/// Reconciler for `db_security_group`
pub struct DbSecurityGroupReconciler {
    api: Arc<dyn DbSecurityGroupApi>,
    wait: WaitConfig,
    authorize_concurrency: usize,
}

impl DbSecurityGroupReconciler {
    pub fn new(api: Arc<dyn DbSecurityGroupApi>) -> Self {
        Self {
            api,
            wait: WaitConfig::default(),
            authorize_concurrency: DEFAULT_AUTHORIZE_CONCURRENCY,
        }
    }

    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn with_authorize_concurrency(mut self, concurrency: usize) -> Self {
        self.authorize_concurrency = concurrency.max(1);
        self
    }

    /// Create the group, authorize every rule and wait until all of them
    /// are authorized
    pub async fn create(&self, desired: &DesiredConfig<'_>) -> ReconcileResult<DbSecurityGroup> {
        self.create_cancellable(desired, std::future::pending()).await
    }

    /// [`create`](Self::create) whose convergence wait ends with
    /// [`ReconcileError::Cancelled`] once `cancel` completes. The group and
    /// its authorized rules stay in place.
    pub async fn create_cancellable<C>(
        &self,
        desired: &DesiredConfig<'_>,
        cancel: C,
    ) -> ReconcileResult<DbSecurityGroup>
    where
        C: Future<Output = ()>,
    {
        let id = desired.id();
        let name = desired.require_string("name")?;
        let description = desired.require_string("description")?;

        let mut rules = IngressRuleSet::new();
        for block in desired.get_blocks("ingress")? {
            let rule = IngressRule::from_block(id, &block)?;
            if !rules.insert(rule) {
                warn!("[{}] Ingress rule {} duplicates an earlier rule", id, block.index);
            }
        }

        debug!("DB Security Group create configuration: {} ({})", name, description);
        self.api
            .create_db_security_group(name, description)
            .await
            .map_err(|e| ReconcileError::remote(id, e))?;
        info!("DB Security Group ID: {}", name);

        self.retrieve_one(id, name).await?;

        self.authorize_all(id, name, &rules).await?;

        info!("Waiting for Ingress Authorizations to be authorized");
        let poller = Poller::new(self.wait, &[STATUS_AUTHORIZING], STATUS_AUTHORIZED);
        let converged = poller
            .wait_with_cancel(|| self.sample(id, name), cancel)
            .await
            .map_err(|e| match e {
                PollError::Sample(err) => err,
                PollError::Timeout {
                    elapsed,
                    last_status,
                    ..
                } => ReconcileError::Timeout {
                    id: id.clone(),
                    target: STATUS_AUTHORIZED.to_string(),
                    last_status,
                    elapsed,
                },
                PollError::UnexpectedStatus { status } => ReconcileError::remote(
                    id,
                    RemoteError::fatal(
                        DESCRIBE_DB_SECURITY_GROUPS,
                        format!("unexpected authorization status '{}'", status),
                    ),
                ),
                PollError::Cancelled => ReconcileError::Cancelled {
                    id: id.clone(),
                    target: STATUS_AUTHORIZED.to_string(),
                },
            })?;
        debug!(
            "[{}] Ingress authorized after {} samples ({:?})",
            id, converged.samples, converged.elapsed
        );

        Ok(DbSecurityGroup::from_record(&converged.value))
    }

    /// Describe the group. Absent yields `None`; several groups answering
    /// to one name is a consistency error.
    pub async fn read(
        &self,
        id: &ResourceId,
        name: &str,
    ) -> ReconcileResult<Option<DbSecurityGroup>> {
        Ok(self
            .retrieve(id, name)
            .await?
            .map(|record| DbSecurityGroup::from_record(&record)))
    }

    /// Every attribute is create-only, so an update is always rejected
    pub fn update(&self, id: &ResourceId) -> ReconcileResult<DbSecurityGroup> {
        Err(ReconcileError::validation(
            id,
            "db_security_group cannot be modified after creation (name, description and \
             ingress are create-only); delete and recreate instead",
        ))
    }

    /// Delete the group; a group that is already gone counts as deleted
    pub async fn delete(&self, id: &ResourceId, name: &str) -> ReconcileResult<()> {
        debug!("DB Security Group destroy: {}", name);
        match self.api.delete_db_security_group(name).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(ReconcileError::remote(id, e)),
        }
    }

    async fn retrieve(
        &self,
        id: &ResourceId,
        name: &str,
    ) -> ReconcileResult<Option<DbSecurityGroupRecord>> {
        let mut groups: Vec<DbSecurityGroupRecord> = self
            .api
            .describe_db_security_groups(name)
            .await
            .map_err(|e| ReconcileError::remote(id, e))?
            .into_iter()
            .filter(|g| g.name == name)
            .collect();

        match groups.len() {
            0 => Ok(None),
            1 => Ok(groups.pop()),
            n => Err(ReconcileError::consistency(
                id,
                DESCRIBE_DB_SECURITY_GROUPS,
                name,
                n,
            )),
        }
    }

    /// Like `retrieve`, but the group must exist
    async fn retrieve_one(
        &self,
        id: &ResourceId,
        name: &str,
    ) -> ReconcileResult<DbSecurityGroupRecord> {
        self.retrieve(id, name).await?.ok_or_else(|| {
            ReconcileError::consistency(id, DESCRIBE_DB_SECURITY_GROUPS, name, 0)
        })
    }

    /// Authorize every rule, at most `authorize_concurrency` at a time.
    /// All rules are attempted; failures are reported together, each naming
    /// its rule.
    async fn authorize_all(
        &self,
        id: &ResourceId,
        name: &str,
        rules: &IngressRuleSet,
    ) -> ReconcileResult<()> {
        let calls: Vec<_> = rules
            .iter()
            .cloned()
            .map(|rule| {
                let api = Arc::clone(&self.api);
                let name = name.to_string();
                async move {
                    debug!("Authorize Ingress Rule configuration: {}", rule);
                    let result = api.authorize_db_security_group_ingress(&name, &rule).await;
                    (rule, result)
                }
            })
            .collect();
        let results: Vec<(IngressRule, Result<(), RemoteError>)> = stream::iter(calls)
            .buffer_unordered(self.authorize_concurrency)
            .collect()
            .await;

        let errors: Vec<ReconcileError> = results
            .into_iter()
            .filter_map(|(rule, result)| result.err().map(|e| (rule, e)))
            .map(|(rule, mut e)| {
                e.message = format!("ingress rule {}: {}", rule, e.message);
                ReconcileError::remote(id, e)
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError::Aggregate {
                id: id.clone(),
                operation: AUTHORIZE_DB_SECURITY_GROUP_INGRESS.to_string(),
                attempted: rules.len(),
                errors,
            })
        }
    }

    async fn sample(
        &self,
        id: &ResourceId,
        name: &str,
    ) -> ReconcileResult<Sample<DbSecurityGroupRecord>> {
        let record = self.retrieve_one(id, name).await?;
        let status = conjunction(record.statuses(), STATUS_AUTHORIZED, STATUS_AUTHORIZING);
        Ok(Sample::new(record, status))
    }
}
