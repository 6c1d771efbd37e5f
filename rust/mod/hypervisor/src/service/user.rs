use hypervisor_core::{ListParams, ListResult, new_id, now_rfc3339};
use hypervisor_sql::{Executor, Value, with_transaction};
use tracing::info;

use crate::model::{CreateUser, ModifyUser, User};
use crate::service::{AdminError, AdminService, page, require};
use crate::store::records;

const TABLE: &str = "users";
const SORTABLE: &[&str] = &["username", "created_at", "updated_at"];

fn indexes(user: &User) -> Vec<(&'static str, Value)> {
    vec![
        ("username", Value::from(user.username.as_str())),
        ("enabled", Value::from(user.enabled)),
        ("updated_at", Value::from(user.updated_at.as_str())),
    ]
}

fn build(input: CreateUser) -> User {
    let now = now_rfc3339();
    User {
        id: new_id(),
        username: input.username,
        name: input.name,
        email: input.email,
        avatar: input.avatar,
        enabled: true,
        account_non_locked: true,
        created_at: now.clone(),
        updated_at: now,
    }
}

fn insert<E: Executor + ?Sized>(db: &E, user: &User) -> Result<(), AdminError> {
    let mut idx = indexes(user);
    idx.push(("created_at", Value::from(user.created_at.as_str())));
    records::insert(db, TABLE, &user.id, user, &idx)
}

impl AdminService {
    pub fn create_user(&self, input: CreateUser) -> Result<User, AdminError> {
        require(&input.username, "username")?;
        if self.user_exists(&input.username, None)? {
            return Err(AdminError::Conflict(format!("user {} already exists", input.username)));
        }
        let user = build(input);
        insert(self.sql.as_ref(), &user)?;
        info!("created user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Bulk import. Either every user is created or none is.
    pub fn create_users(&self, inputs: Vec<CreateUser>) -> Result<Vec<User>, AdminError> {
        for input in &inputs {
            require(&input.username, "username")?;
        }
        let created = with_transaction(self.sql.as_ref(), |tx| {
            let mut created = Vec::with_capacity(inputs.len());
            for input in inputs {
                let user = build(input);
                insert(tx, &user)?;
                created.push(user);
            }
            Ok::<_, AdminError>(created)
        })?;
        info!("imported {} users", created.len());
        Ok(created)
    }

    pub fn fetch_user(&self, id: &str) -> Result<User, AdminError> {
        records::fetch(self.sql.as_ref(), TABLE, id)
    }

    pub fn retrieve_users(&self, params: &ListParams) -> Result<ListResult<User>, AdminError> {
        let (items, total) = records::list(self.sql.as_ref(), TABLE, &[], params, SORTABLE)?;
        Ok(page(items, total, params))
    }

    /// Whether a user other than `exclude_id` already has `username`.
    pub fn user_exists(&self, username: &str, exclude_id: Option<&str>) -> Result<bool, AdminError> {
        records::exists(self.sql.as_ref(), TABLE, "username", username, exclude_id, &[])
    }

    /// Apply a partial update. Memberships follow a username change.
    pub fn modify_user(&self, id: &str, patch: ModifyUser) -> Result<User, AdminError> {
        let mut user = self.fetch_user(id)?;
        let old_username = user.username.clone();
        user.apply(patch);
        require(&user.username, "username")?;

        let renamed = user.username != old_username;
        if renamed && self.user_exists(&user.username, Some(id))? {
            return Err(AdminError::Conflict(format!("user {} already exists", user.username)));
        }
        user.updated_at = now_rfc3339();

        with_transaction(self.sql.as_ref(), |tx| {
            records::update(tx, TABLE, id, &user, &indexes(&user))?;
            if renamed {
                let params = [
                    Value::from(user.username.as_str()),
                    Value::from(old_username.as_str()),
                ];
                tx.exec("UPDATE group_members SET username = ?1 WHERE username = ?2", &params)?;
                tx.exec("UPDATE role_members SET username = ?1 WHERE username = ?2", &params)?;
            }
            Ok::<_, AdminError>(())
        })?;
        Ok(user)
    }

    /// Delete a user and every membership it had.
    pub fn remove_user(&self, id: &str) -> Result<(), AdminError> {
        let user = self.fetch_user(id)?;
        with_transaction(self.sql.as_ref(), |tx| {
            let key = [Value::from(user.username.as_str())];
            tx.exec("DELETE FROM group_members WHERE username = ?1", &key)?;
            tx.exec("DELETE FROM role_members WHERE username = ?1", &key)?;
            records::delete(tx, TABLE, id)
        })?;
        info!("removed user {} ({})", user.username, id);
        Ok(())
    }

    /// Flip the enabled flag.
    pub fn enable_user(&self, id: &str) -> Result<User, AdminError> {
        let mut user = self.fetch_user(id)?;
        user.enabled = !user.enabled;
        user.updated_at = now_rfc3339();
        records::update(self.sql.as_ref(), TABLE, id, &user, &indexes(&user))?;
        Ok(user)
    }
}
