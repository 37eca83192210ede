//! In-process gateway
//!
//! Behaves like the remote backend for everything the operation layer
//! relies on:
//! - ids are generated for rows inserted without one
//! - primary keys and declared unique keys are enforced
//! - foreign keys are checked on write and cascade on delete
//! - faults can be injected per operation and table

use super::{ConflictAction, Filter, Gateway, Query, Record, Table, Upserted};
use crate::error::GatewayError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Gateway call kind, for fault injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    Insert,
    Upsert,
    Update,
    Delete,
    Select,
}

struct ForeignKey {
    column: &'static str,
    parent: Table,
}

const CHALLENGE_CHILD: &[ForeignKey] = &[ForeignKey {
    column: "challenge_id",
    parent: Table::Challenges,
}];
const CRITERION_CHILD: &[ForeignKey] = &[ForeignKey {
    column: "criterion_id",
    parent: Table::DecisionCriteria,
}];
const TEAM_MEMBER: &[ForeignKey] = &[
    ForeignKey {
        column: "engagement_id",
        parent: Table::Engagements,
    },
    ForeignKey {
        column: "person_id",
        parent: Table::People,
    },
];
const SESSION_CHILD: &[ForeignKey] = &[ForeignKey {
    column: "session_id",
    parent: Table::WorkingSessions,
}];
const ENGAGEMENT_CHILD: &[ForeignKey] = &[ForeignKey {
    column: "engagement_id",
    parent: Table::Engagements,
}];

fn foreign_keys(table: Table) -> &'static [ForeignKey] {
    match table {
        Table::Engagements | Table::ChallengeTemplates | Table::People => &[],
        Table::ChallengeOutcomes | Table::ChallengeCategories => CHALLENGE_CHILD,
        Table::CriterionCategories | Table::CriterionActivities => CRITERION_CHILD,
        Table::TeamMembers => TEAM_MEMBER,
        Table::SessionActivities => SESSION_CHILD,
        Table::Challenges
        | Table::DecisionCriteria
        | Table::DeviceScopes
        | Table::BusinessServices
        | Table::WorkingSessions
        | Table::Comments
        | Table::Documents
        | Table::ActivityLog => ENGAGEMENT_CHILD,
    }
}

fn unique_keys(table: Table) -> &'static [&'static [&'static str]] {
    match table {
        Table::People => &[&["email"]],
        Table::TeamMembers => &[&["engagement_id", "person_id"]],
        Table::ChallengeCategories => &[&["challenge_id", "category"]],
        Table::CriterionCategories => &[&["criterion_id", "category"]],
        _ => &[],
    }
}

#[derive(Debug)]
struct Fault {
    op: GatewayOp,
    table: Table,
    /// `None` fails every matching call
    remaining: Option<usize>,
}

/// Gateway backed by in-memory tables
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: RwLock<HashMap<Table, Vec<Record>>>,
    faults: Mutex<Vec<Fault>>,
    calls: DashMap<(GatewayOp, Table), usize>,
    latency: Option<Duration>,
}

impl MemoryGateway {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, to expose interleavings in concurrency tests
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail the next matching call with a transport error
    pub fn fail_next(&self, op: GatewayOp, table: Table) {
        self.faults.lock().push(Fault {
            op,
            table,
            remaining: Some(1),
        });
    }

    /// Fail every matching call until [`clear_faults`](Self::clear_faults)
    pub fn fail_always(&self, op: GatewayOp, table: Table) {
        self.faults.lock().push(Fault {
            op,
            table,
            remaining: None,
        });
    }

    pub fn clear_faults(&self) {
        self.faults.lock().clear();
    }

    /// Number of calls made for an operation and table, failed ones included
    #[must_use]
    pub fn calls(&self, op: GatewayOp, table: Table) -> usize {
        self.calls.get(&(op, table)).map_or(0, |c| *c)
    }

    /// Snapshot of a table's rows in insertion order
    #[must_use]
    pub fn rows(&self, table: Table) -> Vec<Record> {
        self.tables.read().get(&table).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn count(&self, table: Table) -> usize {
        self.tables.read().get(&table).map_or(0, Vec::len)
    }

    async fn enter(&self, op: GatewayOp, table: Table) -> Result<(), GatewayError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        *self.calls.entry((op, table)).or_insert(0) += 1;

        let mut faults = self.faults.lock();
        let Some(index) = faults.iter().position(|f| f.op == op && f.table == table) else {
            return Ok(());
        };
        if let Some(remaining) = faults[index].remaining.as_mut() {
            *remaining -= 1;
            if *remaining == 0 {
                faults.remove(index);
            }
        }
        tracing::debug!(?op, %table, "injected gateway fault");
        Err(GatewayError::Transport(format!(
            "injected {op:?} failure on {table}"
        )))
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn insert(&self, table: Table, rows: Vec<Record>) -> Result<Vec<Record>, GatewayError> {
        self.enter(GatewayOp::Insert, table).await?;
        insert_rows(&mut self.tables.write(), table, rows)
    }

    async fn upsert(
        &self,
        table: Table,
        mut row: Record,
        conflict: &'static [&'static str],
        action: ConflictAction,
    ) -> Result<Upserted, GatewayError> {
        self.enter(GatewayOp::Upsert, table).await?;
        let mut tables = self.tables.write();

        let existing = tables.get(&table).and_then(|rows| {
            rows.iter()
                .position(|r| conflict.iter().all(|c| r.get(*c) == row.get(*c)))
        });
        let Some(index) = existing else {
            let mut inserted = insert_rows(&mut tables, table, vec![row])?;
            let row = inserted.pop().ok_or(GatewayError::NotFound { table })?;
            return Ok(Upserted {
                row,
                inserted: true,
            });
        };

        let rows = tables.entry(table).or_default();
        if action == ConflictAction::Update {
            row.remove("id");
            rows[index].extend(row);
        }
        Ok(Upserted {
            row: rows[index].clone(),
            inserted: false,
        })
    }

    async fn update(
        &self,
        table: Table,
        filters: Vec<Filter>,
        mut patch: Record,
    ) -> Result<Vec<Record>, GatewayError> {
        self.enter(GatewayOp::Update, table).await?;
        patch.remove("id");
        let mut tables = self.tables.write();

        let current = tables.get(&table).cloned().unwrap_or_default();
        let mut next = current.clone();
        let mut updated = Vec::new();
        for (index, row) in current.iter().enumerate() {
            if !filters.iter().all(|f| f.matches(row)) {
                continue;
            }
            let mut merged = row.clone();
            merged.extend(patch.clone());
            check_foreign_keys(&tables, table, &merged)?;
            next[index] = merged.clone();
            updated.push(merged);
        }
        for row in &updated {
            check_unique(next.iter(), table, row)?;
        }

        tables.insert(table, next);
        Ok(updated)
    }

    async fn delete(&self, table: Table, filters: Vec<Filter>) -> Result<Vec<Record>, GatewayError> {
        self.enter(GatewayOp::Delete, table).await?;
        let mut tables = self.tables.write();

        let removed = take_matching(&mut tables, table, |r| filters.iter().all(|f| f.matches(r)));
        let mut pending = vec![(table, ids_of(&removed))];
        while let Some((parent, ids)) = pending.pop() {
            if ids.is_empty() {
                continue;
            }
            for child in Table::ALL {
                for key in foreign_keys(child).iter().filter(|k| k.parent == parent) {
                    let gone = take_matching(&mut tables, child, |r| {
                        r.get(key.column).is_some_and(|v| ids.contains(v))
                    });
                    if !gone.is_empty() {
                        tracing::trace!(%parent, %child, rows = gone.len(), "cascade delete");
                        pending.push((child, ids_of(&gone)));
                    }
                }
            }
        }
        Ok(removed)
    }

    async fn select(&self, table: Table, query: Query) -> Result<Vec<Record>, GatewayError> {
        self.enter(GatewayOp::Select, table).await?;
        let tables = self.tables.read();

        let mut rows: Vec<Record> = tables
            .get(&table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }
}

fn insert_rows(
    tables: &mut HashMap<Table, Vec<Record>>,
    table: Table,
    rows: Vec<Record>,
) -> Result<Vec<Record>, GatewayError> {
    let mut staged: Vec<Record> = Vec::with_capacity(rows.len());
    for mut row in rows {
        assign_id(&mut row);
        check_foreign_keys(tables, table, &row)?;
        let existing = tables.get(&table).into_iter().flatten().chain(staged.iter());
        if existing.clone().any(|other| other.get("id") == row.get("id")) {
            return Err(GatewayError::Constraint {
                table,
                columns: "id".into(),
            });
        }
        check_unique(existing, table, &row)?;
        staged.push(row);
    }
    tables.entry(table).or_default().extend(staged.iter().cloned());
    Ok(staged)
}

fn assign_id(row: &mut Record) {
    let missing = match row.get("id") {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.parse::<Uuid>().map_or(true, |id| id.is_nil()),
        Some(_) => false,
    };
    if missing {
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
}

fn check_foreign_keys(
    tables: &HashMap<Table, Vec<Record>>,
    table: Table,
    row: &Record,
) -> Result<(), GatewayError> {
    for key in foreign_keys(table) {
        let value = match row.get(key.column) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };
        let present = tables
            .get(&key.parent)
            .is_some_and(|rows| rows.iter().any(|r| r.get("id") == Some(value)));
        if !present {
            return Err(GatewayError::ForeignKey {
                table,
                column: key.column.to_string(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

/// Reject `row` if another row shares any declared unique key
fn check_unique<'a>(
    others: impl Iterator<Item = &'a Record> + Clone,
    table: Table,
    row: &Record,
) -> Result<(), GatewayError> {
    let id = row.get("id");
    let others = others.filter(|other| other.get("id") != id);
    for key in unique_keys(table) {
        if key.iter().any(|c| row.get(*c).map_or(true, Value::is_null)) {
            continue;
        }
        if others
            .clone()
            .any(|other| key.iter().all(|c| other.get(*c) == row.get(*c)))
        {
            return Err(GatewayError::Constraint {
                table,
                columns: key.join(", "),
            });
        }
    }
    Ok(())
}

fn take_matching(
    tables: &mut HashMap<Table, Vec<Record>>,
    table: Table,
    pred: impl Fn(&Record) -> bool,
) -> Vec<Record> {
    let rows = tables.entry(table).or_default();
    let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(rows).into_iter().partition(|r| pred(r));
    *rows = kept;
    removed
}

fn ids_of(rows: &[Record]) -> Vec<Value> {
    rows.iter().filter_map(|r| r.get("id").cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    async fn engagement(gateway: &MemoryGateway) -> Value {
        let rows = gateway
            .insert(Table::Engagements, vec![record(json!({ "title": "Acme POV" }))])
            .await
            .unwrap();
        rows[0]["id"].clone()
    }

    #[tokio::test]
    async fn insert_generates_ids() {
        let gateway = MemoryGateway::new();
        let id = engagement(&gateway).await;
        assert!(id.as_str().unwrap().parse::<Uuid>().is_ok());
        assert_eq!(gateway.count(Table::Engagements), 1);
    }

    #[tokio::test]
    async fn provided_ids_are_kept_and_unique() {
        let gateway = MemoryGateway::new();
        let id = Uuid::new_v4();
        let row = record(json!({ "id": id, "title": "x" }));
        let stored = gateway
            .insert(Table::Engagements, vec![row.clone()])
            .await
            .unwrap();
        assert_eq!(stored[0]["id"], json!(id));

        let err = gateway.insert(Table::Engagements, vec![row]).await.unwrap_err();
        assert!(matches!(err, GatewayError::Constraint { .. }));
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let gateway = MemoryGateway::new();
        let err = gateway
            .insert(
                Table::Challenges,
                vec![record(json!({ "engagement_id": Uuid::new_v4(), "title": "orphan" }))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ForeignKey { .. }));
        assert_eq!(gateway.count(Table::Challenges), 0);
    }

    #[tokio::test]
    async fn team_member_needs_both_parents() {
        let gateway = MemoryGateway::new();
        let engagement_id = engagement(&gateway).await;
        let err = gateway
            .insert(
                Table::TeamMembers,
                vec![record(json!({ "engagement_id": engagement_id, "person_id": Uuid::new_v4() }))],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ForeignKey { .. }));

        let person = gateway
            .insert(Table::People, vec![record(json!({ "email": "a@example.com" }))])
            .await
            .unwrap();
        gateway
            .insert(
                Table::TeamMembers,
                vec![record(json!({ "engagement_id": engagement_id, "person_id": person[0]["id"] }))],
            )
            .await
            .unwrap();

        gateway
            .delete(Table::Engagements, vec![Filter::Eq("id", engagement_id)])
            .await
            .unwrap();
        assert_eq!(gateway.count(Table::TeamMembers), 0);
        assert_eq!(gateway.count(Table::People), 1);
    }

    #[tokio::test]
    async fn session_activities_cascade_with_their_session() {
        let gateway = MemoryGateway::new();
        let engagement_id = engagement(&gateway).await;
        let session = gateway
            .insert(
                Table::WorkingSessions,
                vec![record(json!({ "engagement_id": engagement_id, "title": "Day 1" }))],
            )
            .await
            .unwrap();
        gateway
            .insert(
                Table::SessionActivities,
                vec![record(json!({ "session_id": session[0]["id"], "display_order": 0 }))],
            )
            .await
            .unwrap();

        gateway
            .delete(Table::WorkingSessions, vec![Filter::Eq("id", session[0]["id"].clone())])
            .await
            .unwrap();
        assert_eq!(gateway.count(Table::SessionActivities), 0);
        assert_eq!(gateway.count(Table::Engagements), 1);
    }

    #[tokio::test]
    async fn upsert_ignore_returns_existing_row() {
        let gateway = MemoryGateway::new();
        let first = gateway
            .upsert(
                Table::People,
                record(json!({ "email": "a@example.com", "name": "First" })),
                &["email"],
                ConflictAction::Ignore,
            )
            .await
            .unwrap();
        let second = gateway
            .upsert(
                Table::People,
                record(json!({ "email": "a@example.com", "name": "Second" })),
                &["email"],
                ConflictAction::Ignore,
            )
            .await
            .unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);
        assert_eq!(second.row["id"], first.row["id"]);
        assert_eq!(second.row["name"], "First");
        assert_eq!(gateway.count(Table::People), 1);
    }

    #[tokio::test]
    async fn delete_cascades_through_children() {
        let gateway = MemoryGateway::new();
        let engagement_id = engagement(&gateway).await;
        let challenge = gateway
            .insert(
                Table::Challenges,
                vec![record(json!({ "engagement_id": engagement_id, "title": "c" }))],
            )
            .await
            .unwrap();
        gateway
            .insert(
                Table::ChallengeOutcomes,
                vec![record(json!({ "challenge_id": challenge[0]["id"], "text": "o", "order_index": 0 }))],
            )
            .await
            .unwrap();

        let removed = gateway
            .delete(Table::Engagements, vec![Filter::Eq("id", engagement_id)])
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(gateway.count(Table::Challenges), 0);
        assert_eq!(gateway.count(Table::ChallengeOutcomes), 0);
    }

    #[tokio::test]
    async fn update_rejects_unique_collision() {
        let gateway = MemoryGateway::new();
        for email in ["a@example.com", "b@example.com"] {
            gateway
                .insert(Table::People, vec![record(json!({ "email": email }))])
                .await
                .unwrap();
        }
        let err = gateway
            .update(
                Table::People,
                vec![Filter::eq("email", "b@example.com")],
                record(json!({ "email": "a@example.com" })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Constraint { .. }));
        assert_eq!(gateway.rows(Table::People)[1]["email"], "b@example.com");
    }

    #[tokio::test]
    async fn one_shot_fault_fails_once() {
        let gateway = MemoryGateway::new();
        gateway.fail_next(GatewayOp::Select, Table::Engagements);

        let err = gateway.select(Table::Engagements, Query::new()).await;
        assert!(matches!(err, Err(GatewayError::Transport(_))));
        assert!(gateway.select(Table::Engagements, Query::new()).await.is_ok());
        assert_eq!(gateway.calls(GatewayOp::Select, Table::Engagements), 2);
    }

    #[tokio::test]
    async fn select_orders_and_limits() {
        let gateway = MemoryGateway::new();
        let engagement_id = engagement(&gateway).await;
        let challenge = gateway
            .insert(
                Table::Challenges,
                vec![record(json!({ "engagement_id": engagement_id, "title": "c" }))],
            )
            .await
            .unwrap();
        let rows = [2, 0, 1]
            .into_iter()
            .map(|i| record(json!({ "challenge_id": challenge[0]["id"], "text": format!("o{i}"), "order_index": i })))
            .collect();
        gateway.insert(Table::ChallengeOutcomes, rows).await.unwrap();

        let query = Query::new()
            .order_by("order_index", super::super::Order::Asc)
            .limit(2);
        let texts: Vec<_> = gateway
            .select(Table::ChallengeOutcomes, query)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r["text"].clone())
            .collect();
        assert_eq!(texts, vec![json!("o0"), json!("o1")]);
    }
}
