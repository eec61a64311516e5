//! User records in SQLite.
//!
//! Tags and blacklist are stored as JSON arrays, the start time as RFC 3339,
//! the interval as its decimal minute count and the watermark as the
//! serialized tag → id map owned by the sync pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailsift_core::error::{MailSiftError, Result};
use mailsift_core::traits::UserStore;
use mailsift_core::types::{User, UserPatch};
use rusqlite::types::Value;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params, params_from_iter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const USER_COLUMNS: &str = "id, name, email, receiving_email, password, imap_host, imap_port, folder, \
     tags_json, blacklist_json, start_time, summary_count, last_watermark, update_interval, created_at";

/// SQLite-backed user store.
pub struct UserDb {
    conn: Mutex<Connection>,
}

/// Raw column values, converted to a [`User`] outside the row callback.
struct UserRow {
    id: String,
    name: String,
    email: String,
    receiving_email: String,
    password: String,
    imap_host: String,
    imap_port: i64,
    folder: String,
    tags_json: String,
    blacklist_json: String,
    start_time: Option<String>,
    summary_count: i64,
    last_watermark: String,
    update_interval: String,
    created_at: String,
}

impl UserRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            receiving_email: row.get(3)?,
            password: row.get(4)?,
            imap_host: row.get(5)?,
            imap_port: row.get(6)?,
            folder: row.get(7)?,
            tags_json: row.get(8)?,
            blacklist_json: row.get(9)?,
            start_time: row.get(10)?,
            summary_count: row.get(11)?,
            last_watermark: row.get(12)?,
            update_interval: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    fn into_user(self) -> Result<User> {
        let start_time = match self.start_time.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| MailSiftError::Storage(format!("Bad start_time for {}: {e}", self.id)))?
                    .with_timezone(&Utc),
            ),
        };
        Ok(User {
            tags: serde_json::from_str(&self.tags_json).unwrap_or_default(),
            blacklist_senders: serde_json::from_str(&self.blacklist_json).unwrap_or_default(),
            imap_port: u16::try_from(self.imap_port).unwrap_or(993),
            summary_count: u32::try_from(self.summary_count).unwrap_or(1),
            update_interval: self.update_interval.parse()?,
            start_time,
            id: self.id,
            name: self.name,
            email: self.email,
            receiving_email: self.receiving_email,
            password: self.password,
            imap_host: self.imap_host,
            folder: self.folder,
            last_watermark: self.last_watermark,
            created_at: self.created_at,
        })
    }
}

impl UserDb {
    /// Open or create the database file.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| MailSiftError::Storage(format!("Open {}: {e}", path.display())))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;").ok();

        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        tracing::info!("🗄️ User database ready at {}", path.display());
        Ok(db)
    }

    /// In-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        let db = Self { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL DEFAULT '',
                email TEXT NOT NULL UNIQUE,
                receiving_email TEXT NOT NULL DEFAULT '',
                password TEXT NOT NULL DEFAULT '',
                imap_host TEXT NOT NULL DEFAULT '',
                imap_port INTEGER NOT NULL DEFAULT 993,
                folder TEXT NOT NULL DEFAULT 'INBOX',
                tags_json TEXT NOT NULL DEFAULT '[]',
                blacklist_json TEXT NOT NULL DEFAULT '[]',
                start_time TEXT,
                summary_count INTEGER NOT NULL DEFAULT 5,
                last_watermark TEXT NOT NULL DEFAULT '',
                update_interval TEXT NOT NULL DEFAULT '0',
                created_at TEXT DEFAULT (datetime('now')),
                updated_at TEXT DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_users_interval ON users(update_interval);
            ",
        )
        .map_err(|e| MailSiftError::Storage(format!("Migration error: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| MailSiftError::Storage(format!("Lock: {e}")))
    }

    fn select_one(&self, clause: &str, key: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {clause}=?1"),
                params![key],
                UserRow::from_row,
            )
            .optional()
            .map_err(storage)?;
        drop(conn);
        row.map(UserRow::into_user).transpose()
    }
}

fn storage(e: rusqlite::Error) -> MailSiftError {
    MailSiftError::Storage(e.to_string())
}

/// Unique-email violations are caller errors, everything else is storage.
fn write_error(e: rusqlite::Error) -> MailSiftError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            MailSiftError::Config("A user with this email already exists".into())
        }
        _ => storage(e),
    }
}

/// Column assignments for the fields a patch sets.
fn patch_columns(patch: UserPatch) -> Result<Vec<(&'static str, Value)>> {
    let mut cols: Vec<(&'static str, Value)> = Vec::new();
    if let Some(v) = patch.name { cols.push(("name", Value::Text(v))); }
    if let Some(v) = patch.email { cols.push(("email", Value::Text(v))); }
    if let Some(v) = patch.receiving_email { cols.push(("receiving_email", Value::Text(v))); }
    if let Some(v) = patch.password { cols.push(("password", Value::Text(v))); }
    if let Some(v) = patch.imap_host { cols.push(("imap_host", Value::Text(v))); }
    if let Some(v) = patch.imap_port { cols.push(("imap_port", Value::Integer(v.into()))); }
    if let Some(v) = patch.folder { cols.push(("folder", Value::Text(v))); }
    if let Some(v) = patch.tags {
        cols.push(("tags_json", Value::Text(serde_json::to_string(&v)?)));
    }
    if let Some(v) = patch.blacklist_senders {
        cols.push(("blacklist_json", Value::Text(serde_json::to_string(&v)?)));
    }
    if let Some(v) = patch.start_time {
        cols.push(("start_time", v.map_or(Value::Null, |t| Value::Text(t.to_rfc3339()))));
    }
    if let Some(v) = patch.summary_count { cols.push(("summary_count", Value::Integer(v.into()))); }
    if let Some(v) = patch.last_watermark { cols.push(("last_watermark", Value::Text(v))); }
    if let Some(v) = patch.update_interval { cols.push(("update_interval", Value::Text(v.to_string()))); }
    Ok(cols)
}

#[async_trait]
impl UserStore for UserDb {
    async fn create(&self, user: &User) -> Result<()> {
        let tags = serde_json::to_string(&user.tags)?;
        let blacklist = serde_json::to_string(&user.blacklist_senders)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
            ),
            params![
                user.id,
                user.name,
                user.email,
                user.receiving_email,
                user.password,
                user.imap_host,
                user.imap_port,
                user.folder,
                tags,
                blacklist,
                user.start_time.map(|t| t.to_rfc3339()),
                user.summary_count,
                user.last_watermark,
                user.update_interval.to_string(),
                user.created_at,
            ],
        )
        .map_err(write_error)?;
        tracing::debug!(user_id = %user.id, "👤 User created");
        Ok(())
    }

    async fn read(&self, id: &str) -> Result<User> {
        self.select_one("id", id)?
            .ok_or_else(|| MailSiftError::NotFound(format!("user {id}")))
    }

    async fn update(&self, id: &str, patch: UserPatch) -> Result<()> {
        let cols = patch_columns(patch)?;
        if cols.is_empty() {
            return self.read(id).await.map(|_| ());
        }

        let assignments: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, (name, _))| format!("{name}=?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE users SET {}, updated_at=datetime('now') WHERE id=?{}",
            assignments.join(", "),
            cols.len() + 1
        );
        let mut values: Vec<Value> = cols.into_iter().map(|(_, v)| v).collect();
        values.push(Value::Text(id.to_string()));

        let conn = self.lock()?;
        let changed = conn.execute(&sql, params_from_iter(values)).map_err(write_error)?;
        if changed == 0 {
            return Err(MailSiftError::NotFound(format!("user {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn
            .execute("DELETE FROM users WHERE id=?1", params![id])
            .map_err(storage)?;
        if changed == 0 {
            return Err(MailSiftError::NotFound(format!("user {id}")));
        }
        tracing::debug!(user_id = %id, "👤 User deleted");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"))
            .map_err(storage)?;
        let rows = stmt
            .query_map([], UserRow::from_row)
            .map_err(storage)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage)?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(UserRow::into_user).collect()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.select_one("email", email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailsift_core::types::Interval;
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("mailsift-test-{}.db", uuid::Uuid::new_v4()))
    }

    fn ann() -> User {
        User::new("u1", "Ann", "ann@x.io", "ann@y.io", "enc", "imap.x.io", 993)
    }

    #[tokio::test]
    async fn test_user_crud() {
        let path = temp_path();
        let db = UserDb::open(&path).unwrap();
        db.create(&ann()).await.unwrap();

        let user = db.read("u1").await.unwrap();
        assert_eq!(user.email, "ann@x.io");
        assert_eq!(user.folder, "INBOX");
        assert_eq!(user.update_interval, Interval::Disabled);
        assert!(user.start_time.is_none());

        let start = DateTime::parse_from_rfc3339("2025-03-01T08:00:00Z").unwrap().with_timezone(&Utc);
        db.update(
            "u1",
            UserPatch {
                tags: Some(vec!["invoice".into(), "receipt".into()]),
                blacklist_senders: Some(vec!["spam@x.io".into()]),
                start_time: Some(Some(start)),
                update_interval: Some(Interval::minutes(30)),
                last_watermark: Some("{\"invoice\":3}".into()),
                ..UserPatch::default()
            },
        )
        .await
        .unwrap();

        let user = db.read("u1").await.unwrap();
        assert_eq!(user.tags, vec!["invoice".to_string(), "receipt".to_string()]);
        assert_eq!(user.blacklist_senders, vec!["spam@x.io".to_string()]);
        assert_eq!(user.start_time, Some(start));
        assert_eq!(user.update_interval, Interval::minutes(30));
        assert_eq!(user.last_watermark, "{\"invoice\":3}");
        assert_eq!(user.name, "Ann");

        db.update("u1", UserPatch { start_time: Some(None), ..UserPatch::default() }).await.unwrap();
        assert!(db.read("u1").await.unwrap().start_time.is_none());

        db.delete("u1").await.unwrap();
        assert!(matches!(db.read("u1").await, Err(MailSiftError::NotFound(_))));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_missing_user() {
        let db = UserDb::open_in_memory().unwrap();
        assert!(matches!(
            db.update("nope", UserPatch::interval(Interval::minutes(5))).await,
            Err(MailSiftError::NotFound(_))
        ));
        assert!(matches!(db.update("nope", UserPatch::default()).await, Err(MailSiftError::NotFound(_))));
        assert!(matches!(db.delete("nope").await, Err(MailSiftError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = UserDb::open_in_memory().unwrap();
        db.create(&ann()).await.unwrap();
        let mut twin = ann();
        twin.id = "u2".into();
        assert!(matches!(db.create(&twin).await, Err(MailSiftError::Config(_))));
    }

    #[tokio::test]
    async fn test_list_and_find() {
        let db = UserDb::open_in_memory().unwrap();
        db.create(&ann()).await.unwrap();
        let mut bob = User::new("u2", "Bob", "bob@x.io", "bob@y.io", "enc", "imap.x.io", 993);
        bob.update_interval = Interval::minutes(60);
        db.create(&bob).await.unwrap();

        let all = db.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|u| u.id == "u2" && u.update_interval == Interval::minutes(60)));

        assert_eq!(db.find_by_email("bob@x.io").await.unwrap().unwrap().id, "u2");
        assert!(db.find_by_email("carol@x.io").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let path = temp_path();
        {
            let db = UserDb::open(&path).unwrap();
            db.create(&ann()).await.unwrap();
        }
        let db = UserDb::open(&path).unwrap();
        assert_eq!(db.read("u1").await.unwrap().receiving_email, "ann@y.io");
        std::fs::remove_file(&path).ok();
    }
}
