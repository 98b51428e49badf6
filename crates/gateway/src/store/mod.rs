//! Persistence for users and reports.
//!
//! Both collections sit behind object-safe traits so the services can run
//! against Postgres in production and the in-memory reference store in tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::models::{NewReport, NewUser, Report, User};

mod postgres;
mod reference;

pub use self::postgres::PgStore;
pub use self::reference::ReferenceStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Fails with `Conflict` when the username is already taken.
    async fn insert_user(&self, user: NewUser) -> Result<User>;

    /// Replace the stored hash. Returns `false` if the user no longer exists.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// All users, oldest first.
    async fn list_users(&self) -> Result<Vec<User>>;
}

#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn insert_report(&self, report: NewReport) -> Result<Report>;

    /// One page ordered newest first, plus the total number of reports.
    async fn find_page(&self, skip: u64, limit: u64) -> Result<(Vec<Report>, u64)>;

    async fn find_report(&self, id: Uuid) -> Result<Option<Report>>;

    async fn delete_report(&self, id: Uuid) -> Result<bool>;
}

/// The pair of stores the services are wired against.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub reports: Arc<dyn ReportStore>,
    pub backend: &'static str,
}

impl Stores {
    pub fn reference() -> Self {
        let store = ReferenceStore::default();
        Self {
            users: Arc::new(store.clone()),
            reports: Arc::new(store),
            backend: "reference",
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            reports: Arc::new(store),
            backend: "postgres",
        }
    }

    /// Postgres when `DATABASE_URL` is configured, the in-memory store otherwise.
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url, config.db_max_connections).await?;
                Ok(Self::postgres(store))
            }
            None => {
                tracing::warn!("DATABASE_URL is not set; records are kept in memory and lost on exit");
                Ok(Self::reference())
            }
        }
    }
}
