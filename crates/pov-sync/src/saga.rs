//! Compensating rollback for multi-step remote writes
//!
//! After every successful write the operation registers the write that
//! undoes it. When a later write fails, [`Saga::step`] runs the registered
//! compensations newest first and returns the original failure, annotated
//! with any compensation that could not be applied.

use crate::error::{RemoteError, SyncError};
use crate::gateway::{Filter, Gateway, Record, Table};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

type Compensation = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), String>> + Send>;

/// Compensation log for one operation
pub struct Saga {
    operation: &'static str,
    compensations: Vec<(String, Compensation)>,
}

impl Saga {
    #[inline]
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            compensations: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.compensations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.compensations.is_empty()
    }

    /// Register an arbitrary compensation
    pub fn on_rollback<F, Fut, E>(&mut self, label: impl Into<String>, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display,
    {
        let compensation: Compensation =
            Box::new(move || async move { undo().await.map_err(|e| e.to_string()) }.boxed());
        self.compensations.push((label.into(), compensation));
    }

    /// Undo an insert by deleting the row (children cascade)
    pub fn undo_insert(&mut self, gateway: &Arc<dyn Gateway>, table: Table, id: Uuid) {
        let gateway = Arc::clone(gateway);
        self.on_rollback(format!("delete {table} {id}"), move || async move {
            gateway
                .delete(table, vec![Filter::eq("id", id)])
                .await
                .map(|_| ())
        });
    }

    /// Undo a scalar update by writing the previous row back
    pub fn restore_row(&mut self, gateway: &Arc<dyn Gateway>, table: Table, previous: Record) {
        let gateway = Arc::clone(gateway);
        let id = previous.get("id").cloned().unwrap_or(Value::Null);
        self.on_rollback(format!("restore {table} {id}"), move || async move {
            gateway
                .update(table, vec![Filter::Eq("id", id)], previous)
                .await
                .map(|_| ())
        });
    }

    /// Undo a replace-all by deleting what is there now and re-inserting
    /// the rows that were removed
    pub fn restore_rows(
        &mut self,
        gateway: &Arc<dyn Gateway>,
        table: Table,
        filters: Vec<Filter>,
        previous: Vec<Record>,
    ) {
        let gateway = Arc::clone(gateway);
        self.on_rollback(format!("restore {} {table} rows", previous.len()), move || async move {
            gateway.delete(table, filters).await?;
            if !previous.is_empty() {
                gateway.insert(table, previous).await?;
            }
            Ok::<_, crate::error::GatewayError>(())
        });
    }

    /// Await one remote step, rolling back everything registered so far if
    /// it fails
    ///
    /// # Errors
    /// [`SyncError::Remote`] carrying `context`, the step's error and any
    /// compensation failures
    pub async fn step<T, E>(
        &mut self,
        context: &str,
        write: impl Future<Output = Result<T, E>>,
    ) -> Result<T, SyncError>
    where
        E: Into<RemoteError>,
    {
        match write.await {
            Ok(value) => Ok(value),
            Err(e) => Err(self.rollback(context, e.into()).await),
        }
    }

    /// Run compensations newest first and build the resulting error
    pub async fn rollback(&mut self, context: &str, source: RemoteError) -> SyncError {
        let compensations = std::mem::take(&mut self.compensations);
        if !compensations.is_empty() {
            tracing::warn!(
                operation = self.operation,
                steps = compensations.len(),
                error = %source,
                "rolling back"
            );
        }

        let mut failures = Vec::new();
        for (label, undo) in compensations.into_iter().rev() {
            if let Err(e) = undo().await {
                tracing::error!(operation = self.operation, step = %label, error = %e, "compensation failed");
                failures.push(format!("{label}: {e}"));
            }
        }

        SyncError::Remote {
            context: context.to_string(),
            source,
            compensation_failures: failures,
        }
    }

    /// Finish without rolling back
    pub fn complete(self) {
        tracing::debug!(
            operation = self.operation,
            steps = self.compensations.len(),
            "writes committed"
        );
    }
}

impl fmt::Debug for Saga {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Saga")
            .field("operation", &self.operation)
            .field(
                "compensations",
                &self.compensations.iter().map(|(l, _)| l).collect::<Vec<_>>(),
            )
            .finish()
    }
}
