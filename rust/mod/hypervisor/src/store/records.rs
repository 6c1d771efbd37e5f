//! Generic JSON-record helpers shared by every entity table.
//!
//! Entity tables keep the whole record as JSON in `data`, plus the indexed
//! columns needed for lookups, uniqueness checks and ordering.

use hypervisor_core::ListParams;
use hypervisor_sql::{Executor, Row, SQLError, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::service::AdminError;

/// Decode the JSON `data` column of a row.
pub(crate) fn decode<T: DeserializeOwned>(row: &Row) -> Result<T, AdminError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| AdminError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| AdminError::Internal(e.to_string()))
}

fn write_error(e: SQLError) -> AdminError {
    let msg = e.to_string();
    if msg.contains("UNIQUE constraint") {
        AdminError::Conflict(msg)
    } else {
        AdminError::Storage(msg)
    }
}

/// Insert a record as JSON into a table with indexed columns.
pub(crate) fn insert<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), AdminError>
where
    E: Executor + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| AdminError::Internal(e.to_string()))?;

    let mut cols = vec!["id", "data"];
    let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
    let mut params = vec![Value::from(id), Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        cols.push(col);
        placeholders.push(format!("?{}", i + 3));
        params.push(val.clone());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", "),
    );
    db.exec(&sql, &params).map_err(write_error)?;
    Ok(())
}

/// Get a record by id.
pub(crate) fn get<E, T>(db: &E, table: &str, id: &str) -> Result<Option<T>, AdminError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let sql = format!("SELECT data FROM {} WHERE id = ?1", table);
    let rows = db.query(&sql, &[Value::from(id)])?;
    rows.first().map(decode).transpose()
}

/// Get a record by id, failing with `NotFound` when absent.
pub(crate) fn fetch<E, T>(db: &E, table: &str, id: &str) -> Result<T, AdminError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    get(db, table, id)?.ok_or_else(|| AdminError::NotFound(format!("{}/{}", table, id)))
}

/// Update a record's JSON data and indexed columns.
pub(crate) fn update<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), AdminError>
where
    E: Executor + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| AdminError::Internal(e.to_string()))?;

    let mut sets = vec!["data = ?1".to_string()];
    let mut params = vec![Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        sets.push(format!("{} = ?{}", col, i + 2));
        params.push(val.clone());
    }

    let id_idx = params.len() + 1;
    params.push(Value::from(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        table,
        sets.join(", "),
        id_idx,
    );
    let affected = db.exec(&sql, &params).map_err(write_error)?;
    if affected == 0 {
        return Err(AdminError::NotFound(format!("{}/{}", table, id)));
    }
    Ok(())
}

/// Delete a record by id.
pub(crate) fn delete<E>(db: &E, table: &str, id: &str) -> Result<(), AdminError>
where
    E: Executor + ?Sized,
{
    let sql = format!("DELETE FROM {} WHERE id = ?1", table);
    let affected = db.exec(&sql, &[Value::from(id)])?;
    if affected == 0 {
        return Err(AdminError::NotFound(format!("{}/{}", table, id)));
    }
    Ok(())
}

/// Whether a row with `column = value` exists, ignoring `exclude_id`.
///
/// `scope` adds equality filters; a `Value::Null` scope matches `IS NULL`.
pub(crate) fn exists<E>(
    db: &E,
    table: &str,
    column: &str,
    value: &str,
    exclude_id: Option<&str>,
    scope: &[(&str, Value)],
) -> Result<bool, AdminError>
where
    E: Executor + ?Sized,
{
    let mut clauses = vec![format!("{} = ?1", column)];
    let mut params = vec![Value::from(value)];

    if let Some(exclude) = exclude_id {
        params.push(Value::from(exclude));
        clauses.push(format!("id <> ?{}", params.len()));
    }
    for (col, val) in scope {
        if *val == Value::Null {
            clauses.push(format!("{} IS NULL", col));
        } else {
            params.push(val.clone());
            clauses.push(format!("{} = ?{}", col, params.len()));
        }
    }

    let sql = format!(
        "SELECT 1 AS hit FROM {} WHERE {} LIMIT 1",
        table,
        clauses.join(" AND ")
    );
    Ok(!db.query(&sql, &params)?.is_empty())
}

/// List records with equality filters, ordering and pagination.
pub(crate) fn list<E, T>(
    db: &E,
    table: &str,
    filters: &[(&str, Value)],
    params: &ListParams,
    sortable: &[&str],
) -> Result<(Vec<T>, usize), AdminError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let mut where_clauses = Vec::new();
    let mut binds = Vec::new();

    for (col, val) in filters {
        binds.push(val.clone());
        where_clauses.push(format!("{} = ?{}", col, binds.len()));
    }

    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) AS cnt FROM {}{}", table, where_sql);
    let total = db
        .query(&count_sql, &binds)?
        .first()
        .and_then(|r| r.get_i64("cnt"))
        .unwrap_or(0) as usize;

    let order = params.order_column(sortable);
    let direction = if params.descending { "DESC" } else { "ASC" };
    let limit_idx = binds.len() + 1;
    let offset_idx = binds.len() + 2;
    binds.push(Value::Integer(params.size as i64));
    binds.push(Value::Integer(params.offset() as i64));

    let sql = format!(
        "SELECT data FROM {}{} ORDER BY {} {}, id ASC LIMIT ?{} OFFSET ?{}",
        table, where_sql, order, direction, limit_idx, offset_idx,
    );

    let items = db
        .query(&sql, &binds)?
        .iter()
        .map(decode)
        .collect::<Result<Vec<T>, _>>()?;
    Ok((items, total))
}

/// Load every record of a table matching the filters, unpaginated.
pub(crate) fn all<E, T>(db: &E, table: &str, filters: &[(&str, Value)]) -> Result<Vec<T>, AdminError>
where
    E: Executor + ?Sized,
    T: DeserializeOwned,
{
    let mut where_clauses = Vec::new();
    let mut binds = Vec::new();
    for (col, val) in filters {
        if *val == Value::Null {
            where_clauses.push(format!("{} IS NULL", col));
        } else {
            binds.push(val.clone());
            where_clauses.push(format!("{} = ?{}", col, binds.len()));
        }
    }
    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };
    let sql = format!("SELECT data FROM {}{} ORDER BY created_at, id", table, where_sql);
    db.query(&sql, &binds)?.iter().map(decode).collect()
}
