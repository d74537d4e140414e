//! Member store contract and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow document-store surface the registry engines consume.
//! - Isolate SQL details from resolution and reconciliation logic.
//!
//! # Invariants
//! - The store assigns member ids and owns `created_at` / `updated_at`.
//! - Missing members are reported as `Ok(None)` / `Ok(false)`, never as errors.
//! - Read paths reject corrupt persisted rows instead of masking them.

use crate::db::DbError;
use crate::model::member::{Member, MemberDocument, MemberId, MemberPatch};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub use sqlite_store::SqliteMemberStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence-layer failure. Surfaced as-is; the engines never retry.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted member data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Queryable scalar member fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberField {
    Name,
    PrimaryPhone,
    GuardianPhone,
    School,
    ClassLevel,
    Residence,
    GroupFlag,
}

impl MemberField {
    pub(crate) fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::PrimaryPhone => "primary_phone",
            Self::GuardianPhone => "guardian_phone",
            Self::School => "school",
            Self::ClassLevel => "class_level",
            Self::Residence => "residence",
            Self::GroupFlag => "group_flag",
        }
    }
}

/// Result of a full-collection replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Number of members removed before inserting.
    pub deleted: usize,
    /// Ids assigned to the inserted members, in input order.
    pub inserted: Vec<MemberId>,
}

/// Document-store primitives over the member collection.
///
/// Methods are blocking; callers that serve concurrent requests dispatch them
/// onto worker threads.
pub trait MemberStore {
    /// Point lookup by id.
    fn get(&self, id: MemberId) -> StoreResult<Option<Member>>;
    /// Inserts one member under a fresh id with `created_at == updated_at == now`.
    fn insert(&self, document: &MemberDocument) -> StoreResult<MemberId>;
    /// Merges the supplied fields and refreshes `updated_at`.
    ///
    /// Returns `false` when `id` does not exist.
    fn update(&self, id: MemberId, patch: &MemberPatch) -> StoreResult<bool>;
    /// Returns `false` when `id` does not exist.
    fn delete(&self, id: MemberId) -> StoreResult<bool>;
    /// Members whose `field` equals `value`.
    fn query_equals(&self, field: MemberField, value: &str) -> StoreResult<Vec<Member>>;
    /// Members whose `field` lies in `[low, high)`, ordered by that field.
    fn query_range(&self, field: MemberField, low: &str, high: &str) -> StoreResult<Vec<Member>>;
    /// Every member in the collection.
    fn stream_all(&self) -> StoreResult<Vec<Member>>;
    /// Inserts all documents under fresh ids sharing one timestamp.
    fn batch_insert(&self, documents: &[MemberDocument]) -> StoreResult<Vec<MemberId>>;
    /// Deletes every member and returns how many were removed.
    fn batch_delete_all(&self) -> StoreResult<usize>;

    /// Replaces the whole collection with `documents`.
    ///
    /// The default runs delete-all then batch-insert with no atomicity: a
    /// failure between the two phases leaves the collection empty.
    fn replace_all(&self, documents: &[MemberDocument]) -> StoreResult<ReplaceOutcome> {
        let deleted = self.batch_delete_all()?;
        let inserted = self.batch_insert(documents)?;
        Ok(ReplaceOutcome { deleted, inserted })
    }
}
