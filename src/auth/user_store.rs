//! User Storage
//! Mission: Persist user accounts with store-level email uniqueness

use crate::auth::models::User;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with this email already exists")]
    Duplicate,
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _) if err.code == ErrorCode::ConstraintViolation => {
                StoreError::Duplicate
            }
            // busy_timeout ran out; `UserStore::run` fills in the configured duration
            rusqlite::Error::SqliteFailure(ref err, _)
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                StoreError::Timeout(Duration::ZERO)
            }
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

/// Credential store seam used by the registration/login flows.
///
/// `create` must reject a second record for the same email atomically,
/// independent of any earlier `find_by_email` check.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn create(&self, email: &str, password_hash: String) -> Result<User, StoreError>;
}

fn new_user(email: &str, password_hash: String) -> User {
    User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash,
        created_at: Utc::now().to_rfc3339(),
    }
}

/// User storage with SQLite backend
pub struct UserStore {
    db_path: String,
    timeout: Duration,
}

impl UserStore {
    /// Create a new user store and initialize database
    pub fn new(db_path: &str, timeout: Duration) -> anyhow::Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
            timeout,
        };
        store.init_db()?;
        Ok(store)
    }

    /// Initialize database schema
    fn init_db(&self) -> anyhow::Result<()> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open auth database at {}", self.db_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create users table")?;

        info!("🔐 User store ready at {}", self.db_path);
        Ok(())
    }

    fn connect(db_path: &str, timeout: Duration) -> Result<Connection, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(timeout)?;
        Ok(conn)
    }

    /// Run a blocking SQLite operation off the async workers.
    ///
    /// The store timeout is enforced by SQLite's busy handler, so an operation
    /// that gives up has also rolled back: no write lands after a timeout error.
    async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let timeout = self.timeout;
        let task = tokio::task::spawn_blocking(move || {
            let conn = Self::connect(&db_path, timeout)?;
            op(&conn)
        });

        match task.await {
            Ok(Err(StoreError::Timeout(_))) => Err(StoreError::Timeout(timeout)),
            Ok(result) => result,
            Err(join_err) => Err(StoreError::Unavailable(join_err.to_string())),
        }
    }
}

#[async_trait]
impl CredentialStore for UserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = email.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password_hash, created_at FROM users WHERE email = ?1",
                    params![email],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                        ))
                    },
                )
                .optional()?;

            let Some((id, email, password_hash, created_at)) = row else {
                return Ok(None);
            };
            let id = Uuid::parse_str(&id)
                .map_err(|e| StoreError::Unavailable(format!("corrupt user id {id}: {e}")))?;

            Ok(Some(User {
                id,
                email,
                password_hash,
                created_at,
            }))
        })
        .await
    }

    async fn create(&self, email: &str, password_hash: String) -> Result<User, StoreError> {
        let user = new_user(email, password_hash);
        let record = user.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    record.email,
                    record.password_hash,
                    record.created_at,
                ],
            )?;
            Ok(())
        })
        .await?;

        debug!("Inserted user {} ({})", user.email, user.id);
        Ok(user)
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl CredentialStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(email).cloned())
    }

    async fn create(&self, email: &str, password_hash: String) -> Result<User, StoreError> {
        let mut users = self.users.write();
        if users.contains_key(email) {
            return Err(StoreError::Duplicate);
        }
        let user = new_user(email, password_hash);
        users.insert(email.to_string(), user.clone());
        Ok(user)
    }
}
