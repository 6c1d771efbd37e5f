use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value};
use tracing::debug;

use crate::model::{LogEntry, LogKind, RecordLog};
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;

const TABLE: &str = "logs";
const SORTABLE: &[&str] = &["created_at"];

impl AdminService {
    /// Store an access, operation or audit record.
    pub fn record_log(&self, input: RecordLog) -> Result<LogEntry, AdminError> {
        require(&input.operation, "log operation")?;
        let entry = LogEntry {
            id: new_id(),
            kind: input.kind,
            operator: input.operator,
            operation: input.operation,
            content: input.content,
            ip: input.ip,
            status_code: input.status_code,
            created_at: now_rfc3339(),
        };
        records::insert(
            self.sql.as_ref(),
            TABLE,
            &entry.id,
            &entry,
            &[
                ("kind", Value::from(entry.kind.as_str())),
                ("created_at", Value::from(entry.created_at.as_str())),
            ],
        )?;
        debug!("recorded {} log {}", entry.kind, entry.operation);
        Ok(entry)
    }

    pub fn fetch_log(&self, id: &str) -> Result<LogEntry, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    /// Page through logs of one kind, or all kinds when `None`.
    pub fn retrieve_logs(
        &self,
        kind: Option<LogKind>,
        params: &ListParams,
    ) -> Result<ListResult<LogEntry>, AdminError> {
        let filters: Vec<(&str, Value)> = kind
            .map(|k| vec![("kind", Value::from(k.as_str()))])
            .unwrap_or_default();
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &filters, params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    pub fn remove_log(&self, id: &str) -> Result<(), AdminError> {
        records::delete(self.sql.as_ref(), TABLE, id)
    }

    /// Delete every log of `kind`, or every log when `None`. Returns the count removed.
    pub fn clear_logs(&self, kind: Option<LogKind>) -> Result<u64, AdminError> {
        let removed = match kind {
            Some(kind) => self
                .sql
                .exec("DELETE FROM logs WHERE kind = ?1", &[Value::from(kind.as_str())])?,
            None => self.sql.exec("DELETE FROM logs", &[])?,
        };
        Ok(removed)
    }
}
