//! Process-level dependency container.
//!
//! # Responsibility
//! - Own the validated configuration and the opened database connection.
//! - Hand out engines wired to that connection.
//!
//! # Invariants
//! - Built once at startup and passed explicitly; there is no global store
//!   handle.
//! - Engines borrow the context and never outlive it.

use crate::config::{ConfigError, RegistryConfig};
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::phone::PhoneNormalizer;
use crate::service::reconciliation_service::ReconciliationService;
use crate::service::resolution_service::ResolutionService;
use crate::store::SqliteMemberStore;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ContextError {
    Config(ConfigError),
    Db(DbError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ContextError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

pub struct RegistryContext {
    config: RegistryConfig,
    phones: PhoneNormalizer,
    conn: Connection,
}

impl RegistryContext {
    /// Validates `config` and opens the configured database file.
    pub fn open(config: RegistryConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let phones = config.phone_normalizer()?;
        let conn = open_db(&config.database_path)?;
        Ok(Self {
            config,
            phones,
            conn,
        })
    }

    /// Same as [`Self::open`] but backed by an in-memory database.
    pub fn open_in_memory(config: RegistryConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let phones = config.phone_normalizer()?;
        let conn = open_db_in_memory()?;
        Ok(Self {
            config,
            phones,
            conn,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn phones(&self) -> &PhoneNormalizer {
        &self.phones
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn resolution(&self) -> ResolutionService<SqliteMemberStore<'_>> {
        ResolutionService::new(SqliteMemberStore::new(&self.conn), self.phones.clone())
            .with_schedule(self.config.schedule.clone())
    }

    pub fn reconciliation(&self) -> ReconciliationService<SqliteMemberStore<'_>> {
        ReconciliationService::new(SqliteMemberStore::new(&self.conn), self.phones.clone())
            .with_recent_window_days(self.config.statistics.recent_window_days)
    }
}
