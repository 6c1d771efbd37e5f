use hypervisor_sql::{Executor, SQLStore};

use crate::service::AdminError;

/// Initialize the SQLite schema for all hypervisor resources.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), AdminError> {
    let statements = [
        // Privileges: menu / resource forest
        "CREATE TABLE IF NOT EXISTS privileges (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            superior_id TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_privileges_superior ON privileges(superior_id)",

        "CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            enabled INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        "CREATE TABLE IF NOT EXISTS groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            superior_id TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_groups_superior ON groups(superior_id)",

        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            enabled INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",

        // Membership edges
        "CREATE TABLE IF NOT EXISTS group_members (
            group_id TEXT NOT NULL,
            username TEXT NOT NULL,
            PRIMARY KEY (group_id, username)
        )",
        "CREATE INDEX IF NOT EXISTS idx_group_members_username ON group_members(username)",
        "CREATE TABLE IF NOT EXISTS group_roles (
            group_id TEXT NOT NULL,
            role_id TEXT NOT NULL,
            PRIMARY KEY (group_id, role_id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_group_roles_role ON group_roles(role_id)",
        "CREATE TABLE IF NOT EXISTS role_members (
            role_id TEXT NOT NULL,
            username TEXT NOT NULL,
            PRIMARY KEY (role_id, username)
        )",
        "CREATE INDEX IF NOT EXISTS idx_role_members_username ON role_members(username)",

        // Grants: actions is a JSON array of strings
        "CREATE TABLE IF NOT EXISTS role_privileges (
            id TEXT PRIMARY KEY,
            role_id TEXT NOT NULL,
            privilege_id TEXT NOT NULL,
            actions TEXT NOT NULL DEFAULT '[]',
            UNIQUE (role_id, privilege_id)
        )",
        "CREATE TABLE IF NOT EXISTS group_privileges (
            id TEXT PRIMARY KEY,
            group_id TEXT NOT NULL,
            privilege_id TEXT NOT NULL,
            actions TEXT NOT NULL DEFAULT '[]',
            UNIQUE (group_id, privilege_id)
        )",

        // Denormalized authority index
        "CREATE TABLE IF NOT EXISTS group_authorities (
            group_id TEXT NOT NULL,
            authority TEXT NOT NULL,
            PRIMARY KEY (group_id, authority)
        )",

        "CREATE TABLE IF NOT EXISTS dictionaries (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            superior_id TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_dictionaries_superior ON dictionaries(superior_id)",

        "CREATE TABLE IF NOT EXISTS messages (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            receiver TEXT NOT NULL,
            unread INTEGER NOT NULL DEFAULT 1,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver)",

        "CREATE TABLE IF NOT EXISTS logs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_logs_kind ON logs(kind)",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
