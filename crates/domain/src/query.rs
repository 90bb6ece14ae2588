//! 作业查询条件
//!
//! 过滤器在仓储层被翻译成以 AND 连接的查询条件。

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orchestrator_errors::{OrchestratorError, OrchestratorResult};

use crate::entities::{Job, JobStatus};
use crate::value_objects::Identifier;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobField {
    Id,
    TaskId,
    AccountId,
    HostId,
    HostGroup,
    Tag,
    Status,
    Priority,
    Requested,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl QueryOperator {
    pub fn evaluate(&self, ordering: Ordering) -> bool {
        match self {
            QueryOperator::Equal => ordering == Ordering::Equal,
            QueryOperator::NotEqual => ordering != Ordering::Equal,
            QueryOperator::GreaterThan => ordering == Ordering::Greater,
            QueryOperator::GreaterThanOrEqual => ordering != Ordering::Less,
            QueryOperator::LessThan => ordering == Ordering::Less,
            QueryOperator::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }

    fn is_equality(&self) -> bool {
        matches!(self, QueryOperator::Equal | QueryOperator::NotEqual)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QueryValue {
    Text(String),
    Status(JobStatus),
    Integer(i64),
    Time(DateTime<Utc>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryCondition {
    pub field: JobField,
    pub operator: QueryOperator,
    pub value: QueryValue,
}

impl QueryCondition {
    pub fn new(field: JobField, operator: QueryOperator, value: QueryValue) -> Self {
        Self {
            field,
            operator,
            value,
        }
    }

    pub fn equals(field: JobField, value: QueryValue) -> Self {
        Self::new(field, QueryOperator::Equal, value)
    }

    fn malformed(&self) -> OrchestratorError {
        OrchestratorError::invalid_argument(format!(
            "查询条件格式错误: {:?} {:?} {:?}",
            self.field, self.operator, self.value
        ))
    }

    /// 文本/状态字段仅支持相等比较；缺失的可选字段只满足 NotEqual
    pub fn matches<J: Identifier, T: Identifier>(
        &self,
        job: &Job<J, T>,
    ) -> OrchestratorResult<bool> {
        let text_field = match self.field {
            JobField::Id => Some(Some(job.id.to_string())),
            JobField::TaskId => Some(Some(job.task_id.to_string())),
            JobField::AccountId => Some(job.account_id.clone()),
            JobField::HostId => Some(job.host_id.clone()),
            JobField::HostGroup => Some(job.host_group.clone()),
            JobField::Tag => Some(job.tag.clone()),
            _ => None,
        };

        if let Some(actual) = text_field {
            let QueryValue::Text(expected) = &self.value else {
                return Err(self.malformed());
            };
            if !self.operator.is_equality() {
                return Err(self.malformed());
            }
            let ordering = match actual {
                Some(actual) if &actual == expected => Ordering::Equal,
                _ => Ordering::Less,
            };
            return Ok(self.operator.evaluate(ordering));
        }

        match (self.field, &self.value) {
            (JobField::Status, QueryValue::Status(expected)) if self.operator.is_equality() => {
                let ordering = if job.status == *expected {
                    Ordering::Equal
                } else {
                    Ordering::Less
                };
                Ok(self.operator.evaluate(ordering))
            }
            (JobField::Priority, QueryValue::Integer(expected)) => {
                Ok(self.operator.evaluate(i64::from(job.priority).cmp(expected)))
            }
            (JobField::Requested, QueryValue::Time(expected)) => {
                Ok(self.operator.evaluate(job.requested.cmp(expected)))
            }
            _ => Err(self.malformed()),
        }
    }
}

/// 以 AND 连接的查询条件
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub conditions: Vec<QueryCondition>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: QueryCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches<J: Identifier, T: Identifier>(
        &self,
        job: &Job<J, T>,
    ) -> OrchestratorResult<bool> {
        for condition in &self.conditions {
            if !condition.matches(job)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// 作业过滤器
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobFilter<T = String> {
    pub account_id: Option<String>,
    pub task_id: Option<T>,
    pub host_id: Option<String>,
    pub tag: Option<String>,
    pub status: Option<JobStatus>,
    /// 请求时间下限（含）
    pub since: Option<DateTime<Utc>>,
    /// 请求时间上限（不含）
    pub before: Option<DateTime<Utc>>,
}

impl<T> Default for JobFilter<T> {
    fn default() -> Self {
        Self {
            account_id: None,
            task_id: None,
            host_id: None,
            tag: None,
            status: None,
            since: None,
            before: None,
        }
    }
}

impl<T: Identifier> JobFilter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account<S: Into<String>>(mut self, account_id: S) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_task(mut self, task_id: T) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn with_host<S: Into<String>>(mut self, host_id: S) -> Self {
        self.host_id = Some(host_id.into());
        self
    }

    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn before(mut self, before: DateTime<Utc>) -> Self {
        self.before = Some(before);
        self
    }

    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        if let Some(account_id) = &self.account_id {
            query = query.and(QueryCondition::equals(
                JobField::AccountId,
                QueryValue::Text(account_id.clone()),
            ));
        }
        if let Some(task_id) = &self.task_id {
            query = query.and(QueryCondition::equals(
                JobField::TaskId,
                QueryValue::Text(task_id.to_string()),
            ));
        }
        if let Some(host_id) = &self.host_id {
            query = query.and(QueryCondition::equals(
                JobField::HostId,
                QueryValue::Text(host_id.clone()),
            ));
        }
        if let Some(tag) = &self.tag {
            query = query.and(QueryCondition::equals(
                JobField::Tag,
                QueryValue::Text(tag.clone()),
            ));
        }
        if let Some(status) = self.status {
            query = query.and(QueryCondition::equals(
                JobField::Status,
                QueryValue::Status(status),
            ));
        }
        if let Some(since) = self.since {
            query = query.and(QueryCondition::new(
                JobField::Requested,
                QueryOperator::GreaterThanOrEqual,
                QueryValue::Time(since),
            ));
        }
        if let Some(before) = self.before {
            query = query.and(QueryCondition::new(
                JobField::Requested,
                QueryOperator::LessThan,
                QueryValue::Time(before),
            ));
        }
        query
    }
}
