//! Typed access on top of the JSON row port

use super::{ConflictAction, Filter, Gateway, Query, Record, Table};
use crate::error::GatewayError;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A serde struct stored in one gateway table
pub trait TableRow: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: Table;

    /// Primary key; nil before the backend assigns one
    fn id(&self) -> Uuid;
}

/// Row owned by one engagement
pub trait ScopedRow: TableRow + Clone {
    fn engagement_id(&self) -> Uuid;
}

/// Typed helpers available on every [`Gateway`]
pub trait GatewayExt: Gateway {
    /// Insert one row and decode the stored copy
    fn insert_row<'a, R: TableRow>(&'a self, row: &'a R) -> BoxFuture<'a, Result<R, GatewayError>> {
        Box::pin(async move {
            let mut stored = self.insert(R::TABLE, vec![encode(row)?]).await?;
            let record = stored.pop().ok_or(GatewayError::NotFound { table: R::TABLE })?;
            decode(record)
        })
    }

    /// Insert rows in one atomic call; an empty slice is a no-op
    fn insert_rows<'a, R: TableRow>(
        &'a self,
        rows: &'a [R],
    ) -> BoxFuture<'a, Result<Vec<R>, GatewayError>> {
        Box::pin(async move {
            if rows.is_empty() {
                return Ok(Vec::new());
            }
            let records = rows.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
            self.insert(R::TABLE, records)
                .await?
                .into_iter()
                .map(decode)
                .collect()
        })
    }

    /// Upsert on `conflict`, returning the stored row and whether it was new
    fn upsert_row<'a, R: TableRow>(
        &'a self,
        row: &'a R,
        conflict: &'static [&'static str],
        action: ConflictAction,
    ) -> BoxFuture<'a, Result<(R, bool), GatewayError>> {
        Box::pin(async move {
            let upserted = self.upsert(R::TABLE, encode(row)?, conflict, action).await?;
            Ok((decode(upserted.row)?, upserted.inserted))
        })
    }

    /// Apply a serializable patch to matching rows
    fn update_rows<'a, R: TableRow, P: Serialize + Sync>(
        &'a self,
        filters: Vec<Filter>,
        patch: &'a P,
    ) -> BoxFuture<'a, Result<Vec<R>, GatewayError>> {
        Box::pin(async move {
            let mut patch = encode_as(R::TABLE, patch)?;
            patch.remove("id");
            self.update(R::TABLE, filters, patch)
                .await?
                .into_iter()
                .map(decode)
                .collect()
        })
    }

    /// Delete matching rows, returning what was removed
    fn delete_rows<'a, R: TableRow>(
        &'a self,
        filters: Vec<Filter>,
    ) -> BoxFuture<'a, Result<Vec<R>, GatewayError>> {
        Box::pin(async move {
            self.delete(R::TABLE, filters)
                .await?
                .into_iter()
                .map(decode)
                .collect()
        })
    }

    fn select_rows<'a, R: TableRow>(
        &'a self,
        query: Query,
    ) -> BoxFuture<'a, Result<Vec<R>, GatewayError>> {
        Box::pin(async move {
            self.select(R::TABLE, query)
                .await?
                .into_iter()
                .map(decode)
                .collect()
        })
    }

    /// First row matching `query`, if any
    fn select_row<'a, R: TableRow>(
        &'a self,
        query: Query,
    ) -> BoxFuture<'a, Result<Option<R>, GatewayError>> {
        Box::pin(async move {
            let mut rows = self.select_rows::<R>(query.limit(1)).await?;
            Ok(rows.pop())
        })
    }

    /// Row by primary key; absence is an error
    fn fetch_row<'a, R: TableRow>(&'a self, id: Uuid) -> BoxFuture<'a, Result<R, GatewayError>> {
        Box::pin(async move {
            self.select_row::<R>(Query::by("id", id))
                .await?
                .ok_or(GatewayError::NotFound { table: R::TABLE })
        })
    }
}

impl<G: Gateway + ?Sized> GatewayExt for G {}

pub(crate) fn encode<R: TableRow>(row: &R) -> Result<Record, GatewayError> {
    encode_as(R::TABLE, row)
}

fn encode_as<T: Serialize>(table: Table, value: &T) -> Result<Record, GatewayError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(GatewayError::Serialization {
            table,
            message: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(GatewayError::serialization(table, &e)),
    }
}

pub(crate) fn decode<R: TableRow>(record: Record) -> Result<R, GatewayError> {
    serde_json::from_value(Value::Object(record)).map_err(|e| GatewayError::serialization(R::TABLE, &e))
}
