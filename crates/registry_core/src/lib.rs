//! Core engine of the community member registry.
//!
//! Resolves "is this person already registered?" from a first name and a
//! phone number, and reconciles bulk CSV dumps against the member store.

pub mod config;
pub mod context;
pub mod db;
pub mod logging;
pub mod matching;
pub mod model;
pub mod phone;
pub mod service;
pub mod store;

pub use config::{ConfigError, RegistryConfig};
pub use context::{ContextError, RegistryContext};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use matching::{matches_contains, matches_prefix};
pub use model::attendance::{date_key, parse_date_key, Attendance, ServiceSchedule, ServiceSlot};
pub use model::member::{GroupFlag, Member, MemberDocument, MemberDraft, MemberId, MemberPatch};
pub use model::validation::ValidationError;
pub use phone::{NumberingPlan, PhoneClass, PhoneNormalizer};
pub use service::reconciliation_service::{ImportReport, MemberStatistics, ReconciliationService};
pub use service::resolution_service::ResolutionService;
pub use service::{ServiceError, ServiceResult};
pub use store::{MemberField, MemberStore, ReplaceOutcome, SqliteMemberStore, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
