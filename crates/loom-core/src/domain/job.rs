//! Job aggregate.
//!
//! A `Job` is an immutable snapshot. Every operation validates against the
//! transition table and returns a new snapshot stamped with the caller's
//! time; the receiver is never modified. Persisting the returned value is the
//! caller's job (see `JobRepository::save`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use super::errors::JobError;
use super::ids::JobId;
use super::retry::RetryPolicy;
use super::state::{self, JobStatus};

/// Opaque key/value map used for payloads and metadata.
pub type JsonMap = Map<String, Value>;

/// Non-empty job name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobName(String);

impl JobName {
    pub fn new(name: impl Into<String>) -> Result<Self, JobError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(JobError::InvalidName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for JobName {
    type Error = JobError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JobName> for String {
    fn from(name: JobName) -> Self {
        name.0
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scheduling priority; higher is more urgent.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Priority(u32);

impl Priority {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Priority {
    type Error = JobError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| JobError::InvalidPriority(value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    id: JobId,
    name: JobName,
    status: JobStatus,
    attempts: u32,
    priority: Priority,
    retry_policy: Option<RetryPolicy>,
    dependencies: Vec<JobId>,
    payload: JsonMap,
    metadata: JsonMap,
    result: Option<Value>,
    last_error: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Job {
    pub fn builder(name: JobName) -> JobBuilder {
        JobBuilder::new(name)
    }

    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn name(&self) -> &JobName {
        &self.name
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn dependencies(&self) -> &[JobId] {
        &self.dependencies
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependencies.is_empty()
    }

    pub fn payload(&self) -> &JsonMap {
        &self.payload
    }

    pub fn metadata(&self) -> &JsonMap {
        &self.metadata
    }

    /// Value returned by the executor on success.
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// When a delayed job becomes due, if it was delayed by a retry.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    // ---- transitions ----

    /// Hand the job to the executor.
    ///
    /// A delayed job is released through `Pending` first, so both hops are
    /// checked against the table.
    pub fn start(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let from = if self.status == JobStatus::Delayed {
            state::transition(self.status, JobStatus::Pending)?
        } else {
            self.status
        };
        let status = state::transition(from, JobStatus::Executing)?;
        Ok(self.with_status(status, at))
    }

    /// Mark the job finished. Clears any pending retry schedule.
    pub fn complete(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Finished)?;
        let mut next = self.with_status(status, at);
        next.scheduled_at = None;
        Ok(next)
    }

    pub fn fail(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Failed)?;
        Ok(self.with_status(status, at))
    }

    /// Defer the job by its current backoff delay.
    pub fn delay(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Delayed)?;
        let mut next = self.with_status(status, at);
        next.scheduled_at = Some(next.due_at(at));
        Ok(next)
    }

    pub fn cancel(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Cancelled)?;
        Ok(self.with_status(status, at))
    }

    /// Checked move into `Waiting`. The table has no edge into `Waiting`, so
    /// this fails from every state; a job is parked by building it as
    /// `Waiting` before it is stored.
    pub fn to_waiting(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Waiting)?;
        Ok(self.with_status(status, at))
    }

    /// Release the job, merging `patch` into its payload.
    pub fn to_pending(&self, patch: Option<JsonMap>, at: DateTime<Utc>) -> Result<Job, JobError> {
        let status = state::transition(self.status, JobStatus::Pending)?;
        let mut next = self.with_status(status, at);
        if let Some(patch) = patch {
            next.payload.extend(patch);
        }
        Ok(next)
    }

    /// Manual retry of a failed job: `Failed -> Delayed` while the policy
    /// still has budget.
    pub fn retry(&self, at: DateTime<Utc>) -> Result<Job, JobError> {
        let policy = self
            .retry_policy
            .as_ref()
            .ok_or_else(|| JobError::NoRetryPolicy(self.id.clone()))?;
        if !policy.should_retry(self.attempts) {
            return Err(JobError::MaxAttemptsReached {
                job_id: self.id.clone(),
                attempts: self.attempts,
                max_attempts: policy.max_attempts(),
            });
        }
        self.delay(at)
    }

    // ---- field updates ----

    pub fn with_attempt(&self, attempts: u32, at: DateTime<Utc>) -> Job {
        Job {
            attempts,
            updated_at: at,
            ..self.clone()
        }
    }

    pub fn with_result(&self, result: Value, at: DateTime<Utc>) -> Job {
        Job {
            result: Some(result),
            updated_at: at,
            ..self.clone()
        }
    }

    pub fn with_last_error(&self, message: impl Into<String>, at: DateTime<Utc>) -> Job {
        Job {
            last_error: Some(message.into()),
            updated_at: at,
            ..self.clone()
        }
    }

    /// Add a dependency; adding one that is already present is a no-op.
    pub fn add_dependency(&self, dependency: JobId, at: DateTime<Utc>) -> Job {
        if self.dependencies.contains(&dependency) {
            return self.clone();
        }
        let mut next = self.clone();
        next.dependencies.push(dependency);
        next.updated_at = at;
        next
    }

    // ---- retry helpers ----

    pub fn can_be_retried(&self) -> bool {
        self.retry_policy
            .as_ref()
            .is_some_and(|policy| policy.should_retry(self.attempts))
    }

    /// Backoff for the current attempt count; zero without a policy.
    pub fn calculate_backoff_delay(&self) -> Duration {
        self.retry_policy
            .as_ref()
            .map(|policy| policy.calculate_delay(self.attempts))
            .unwrap_or(Duration::ZERO)
    }

    /// Has the backoff window since the last update elapsed?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.due_at(self.updated_at)
    }

    fn due_at(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.calculate_backoff_delay())
            .ok()
            .and_then(|delay| from.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Builder seeded with every field of this snapshot.
    pub(crate) fn rebuild(&self) -> JobBuilder {
        JobBuilder {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            status: Some(self.status),
            attempts: self.attempts,
            priority: self.priority,
            retry_policy: self.retry_policy.clone(),
            dependencies: self.dependencies.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            result: self.result.clone(),
            last_error: self.last_error.clone(),
            scheduled_at: self.scheduled_at,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }

    fn with_status(&self, status: JobStatus, at: DateTime<Utc>) -> Job {
        Job {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

/// Builds new jobs and rehydrates stored ones.
#[derive(Debug, Clone)]
pub struct JobBuilder {
    id: Option<JobId>,
    name: JobName,
    status: Option<JobStatus>,
    attempts: u32,
    priority: Priority,
    retry_policy: Option<RetryPolicy>,
    dependencies: Vec<JobId>,
    payload: JsonMap,
    metadata: JsonMap,
    result: Option<Value>,
    last_error: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl JobBuilder {
    pub fn new(name: JobName) -> Self {
        Self {
            id: None,
            name,
            status: None,
            attempts: 0,
            priority: Priority::default(),
            retry_policy: None,
            dependencies: Vec::new(),
            payload: JsonMap::new(),
            metadata: JsonMap::new(),
            result: None,
            last_error: None,
            scheduled_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    /// Explicit status, for rehydration. Defaults to `Pending`, or `Waiting`
    /// when the job has dependencies.
    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Duplicates are dropped; first occurrence order is kept.
    pub fn dependencies(mut self, dependencies: impl IntoIterator<Item = JobId>) -> Self {
        for dependency in dependencies {
            if !self.dependencies.contains(&dependency) {
                self.dependencies.push(dependency);
            }
        }
        self
    }

    pub fn payload(mut self, payload: JsonMap) -> Self {
        self.payload = payload;
        self
    }

    pub fn metadata(mut self, metadata: JsonMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn last_error(mut self, message: impl Into<String>) -> Self {
        self.last_error = Some(message.into());
        self
    }

    pub fn scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// `now` fills in any timestamp that was not set explicitly.
    pub fn build(self, now: DateTime<Utc>) -> Job {
        let status = self.status.unwrap_or(if self.dependencies.is_empty() {
            JobStatus::Pending
        } else {
            JobStatus::Waiting
        });
        let created_at = self.created_at.unwrap_or(now);
        Job {
            id: self.id.unwrap_or_else(JobId::generate),
            name: self.name,
            status,
            attempts: self.attempts,
            priority: self.priority,
            retry_policy: self.retry_policy,
            dependencies: self.dependencies,
            payload: self.payload,
            metadata: self.metadata,
            result: self.result,
            last_error: self.last_error,
            scheduled_at: self.scheduled_at,
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        }
    }
}
