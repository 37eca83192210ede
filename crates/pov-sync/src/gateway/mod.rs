//! Remote data gateway port
//!
//! Row-level access to the backing store. Rows travel as JSON objects so
//! the port stays independent of any one backend; [`GatewayExt`] maps them
//! to typed rows and [`crate::compose`] assembles nested entities.
//!
//! The backend is assumed to:
//! - generate an `id` for rows inserted without one
//! - enforce unique keys and foreign keys
//! - cascade deletes from parent rows to their children

mod ext;
mod memory;
pub mod rows;

pub use ext::{GatewayExt, ScopedRow, TableRow};
pub(crate) use ext::encode;
pub use memory::{GatewayOp, MemoryGateway};

use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// A row as exchanged with the gateway
pub type Record = serde_json::Map<String, Value>;

/// Remote tables backing the engagement aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Engagements,
    Challenges,
    ChallengeOutcomes,
    ChallengeCategories,
    ChallengeTemplates,
    DecisionCriteria,
    CriterionCategories,
    CriterionActivities,
    People,
    TeamMembers,
    DeviceScopes,
    BusinessServices,
    WorkingSessions,
    SessionActivities,
    Comments,
    Documents,
    ActivityLog,
}

impl Table {
    /// Every table, parents before children
    pub const ALL: [Table; 17] = [
        Table::Engagements,
        Table::ChallengeTemplates,
        Table::People,
        Table::Challenges,
        Table::ChallengeOutcomes,
        Table::ChallengeCategories,
        Table::DecisionCriteria,
        Table::CriterionCategories,
        Table::CriterionActivities,
        Table::TeamMembers,
        Table::DeviceScopes,
        Table::BusinessServices,
        Table::WorkingSessions,
        Table::SessionActivities,
        Table::Comments,
        Table::Documents,
        Table::ActivityLog,
    ];

    /// Backend table name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Engagements => "engagements",
            Self::Challenges => "challenges",
            Self::ChallengeOutcomes => "challenge_outcomes",
            Self::ChallengeCategories => "challenge_categories",
            Self::ChallengeTemplates => "challenge_templates",
            Self::DecisionCriteria => "decision_criteria",
            Self::CriterionCategories => "criterion_categories",
            Self::CriterionActivities => "criterion_activities",
            Self::People => "people",
            Self::TeamMembers => "team_members",
            Self::DeviceScopes => "device_scopes",
            Self::BusinessServices => "business_services",
            Self::WorkingSessions => "working_sessions",
            Self::SessionActivities => "session_activities",
            Self::Comments => "comments",
            Self::Documents => "documents",
            Self::ActivityLog => "activity_log",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Row predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Filter {
    /// `column = value`
    pub fn eq(column: &'static str, value: impl Serialize) -> Self {
        Self::Eq(column, to_value(value))
    }

    /// `column IN (values)`
    pub fn any<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Serialize,
    {
        Self::In(column, values.into_iter().map(to_value).collect())
    }

    /// Check a row against this predicate; absent columns compare as null
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        match self {
            Self::Eq(column, value) => row.get(*column).unwrap_or(&Value::Null) == value,
            Self::In(column, values) => {
                let cell = row.get(*column).unwrap_or(&Value::Null);
                values.iter().any(|v| v == cell)
            }
        }
    }

    #[must_use]
    pub fn column(&self) -> &'static str {
        match self {
            Self::Eq(column, _) | Self::In(column, _) => column,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Select query: conjunctive filters, ordering and optional limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Vec<(&'static str, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Query matching `column = value`
    pub fn by(column: &'static str, value: impl Serialize) -> Self {
        Self::new().filter(Filter::eq(column, value))
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: &'static str, order: Order) -> Self {
        self.order_by.push((column, order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check a row against every filter
    #[must_use]
    pub fn matches(&self, row: &Record) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Compare two rows by the query's ordering
    #[must_use]
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.order_by
            .iter()
            .map(|(column, order)| {
                let ord = compare_values(
                    a.get(*column).unwrap_or(&Value::Null),
                    b.get(*column).unwrap_or(&Value::Null),
                );
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

/// What an upsert does when the conflict key already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    /// Keep the stored row and return it
    Ignore,
    /// Overwrite the stored row with the submitted columns
    Update,
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted {
    pub row: Record,
    /// `false` when the conflict key already existed
    pub inserted: bool,
}

/// Row-level remote store
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Insert rows atomically, returning them with generated ids
    async fn insert(&self, table: Table, rows: Vec<Record>) -> Result<Vec<Record>, GatewayError>;

    /// Insert a row or resolve a conflict on `conflict` columns
    async fn upsert(
        &self,
        table: Table,
        row: Record,
        conflict: &'static [&'static str],
        action: ConflictAction,
    ) -> Result<Upserted, GatewayError>;

    /// Merge `patch` into every matching row, returning the updated rows
    async fn update(
        &self,
        table: Table,
        filters: Vec<Filter>,
        patch: Record,
    ) -> Result<Vec<Record>, GatewayError>;

    /// Delete matching rows (children cascade), returning the deleted rows
    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<Vec<Record>, GatewayError>;

    /// Read matching rows
    async fn select(&self, table: Table, query: Query) -> Result<Vec<Record>, GatewayError>;
}

fn to_value(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Total order over JSON cells; timestamps compare chronologically
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn filters_compare_serialized_values() {
        let id = Uuid::new_v4();
        let row = record(json!({ "id": id, "status": "OPEN" }));
        assert!(Filter::eq("id", id).matches(&row));
        assert!(Filter::any("status", ["OPEN", "COMPLETED"]).matches(&row));
        assert!(!Filter::eq("status", "COMPLETED").matches(&row));
        assert!(Filter::eq("missing", Value::Null).matches(&row));
    }

    #[test]
    fn timestamps_order_chronologically() {
        let early = record(json!({ "created_at": "2024-01-01T00:00:00Z" }));
        let late = record(json!({ "created_at": "2024-01-01T00:00:00.5Z" }));
        let query = Query::new().order_by("created_at", Order::Desc);
        assert_eq!(query.compare(&late, &early), Ordering::Less);
    }

    #[test]
    fn numeric_ordering_uses_value() {
        let a = record(json!({ "order_index": 2 }));
        let b = record(json!({ "order_index": 10 }));
        let query = Query::new().order_by("order_index", Order::Asc);
        assert_eq!(query.compare(&a, &b), Ordering::Less);
    }
}
