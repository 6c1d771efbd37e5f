use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value};

use crate::model::{CreateMessage, Message};
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;

const TABLE: &str = "messages";
const SORTABLE: &[&str] = &["title", "created_at"];

fn indexes(message: &Message) -> Vec<(&'static str, Value)> {
    vec![
        ("title", Value::from(message.title.as_str())),
        ("receiver", Value::from(message.receiver.as_str())),
        ("unread", Value::from(message.unread)),
        ("updated_at", Value::from(message.updated_at.as_str())),
    ]
}

impl AdminService {
    pub fn create_message(&self, input: CreateMessage) -> Result<Message, AdminError> {
        require(&input.title, "message title")?;
        require(&input.receiver, "message receiver")?;

        let now = now_rfc3339();
        let message = Message {
            id: new_id(),
            title: input.title,
            content: input.content,
            receiver: input.receiver,
            unread: true,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        let mut idx = indexes(&message);
        idx.push(("created_at", Value::Text(now)));
        records::insert(self.sql.as_ref(), TABLE, &message.id, &message, &idx)?;
        Ok(message)
    }

    /// Load a message and mark it read.
    pub fn fetch_message(&self, id: &str) -> Result<Message, AdminError> {
        let mut message: Message = records::fetch(self.sql.as_ref(), TABLE, id)?;
        if message.unread {
            message.unread = false;
            message.updated_at = now_rfc3339();
            records::update(self.sql.as_ref(), TABLE, id, &message, &indexes(&message))?;
        }
        Ok(message)
    }

    /// Page through messages, optionally only those addressed to `receiver`.
    pub fn retrieve_messages(
        &self,
        receiver: Option<&str>,
        params: &ListParams,
    ) -> Result<ListResult<Message>, AdminError> {
        let filters: Vec<(&str, Value)> = receiver
            .filter(|r| !r.is_empty())
            .map(|r| vec![("receiver", Value::from(r))])
            .unwrap_or_default();
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &filters, params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    pub fn unread_messages(&self, receiver: &str) -> Result<usize, AdminError> {
        let rows = self.sql.query(
            "SELECT COUNT(*) AS cnt FROM messages WHERE receiver = ?1 AND unread = 1",
            &[Value::from(receiver)],
        )?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
    }

    pub fn remove_message(&self, id: &str) -> Result<(), AdminError> {
        records::delete(self.sql.as_ref(), TABLE, id)
    }
}
