//! Member registry domain model.
//!
//! # Responsibility
//! - Define the canonical member record and its write-side drafts.
//! - Own the field-level validation rules enforced before persistence.
//!
//! # Invariants
//! - Every member is identified by a stable `MemberId` assigned by the store.
//! - Attendance keys are `DD_MM_YYYY` dates mapped to a service slot.
//! - Phone fields are stored in canonical form, never raw input.

pub mod attendance;
pub mod member;
pub mod validation;
