//! Member domain records.
//!
//! # Responsibility
//! - Define the persisted member shape and the drafts used to create or
//!   patch it.
//!
//! # Invariants
//! - `id` is assigned once by the store and never reused.
//! - `created_at` is set once; `updated_at` moves on every mutation.
//! - `primary_phone` and `guardian_phone` hold canonical phone strings.

use crate::model::attendance::Attendance;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of a registered member.
pub type MemberId = Uuid;

/// Binary subgroup membership indicator, serialized as `"0"` / `"1"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupFlag {
    #[default]
    #[serde(rename = "0")]
    Out,
    #[serde(rename = "1")]
    In,
}

impl GroupFlag {
    /// Wire/storage code for this flag.
    pub fn code(self) -> &'static str {
        match self {
            Self::Out => "0",
            Self::In => "1",
        }
    }

    /// Strict parse: only the exact codes `"0"` and `"1"` are accepted.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "0" => Some(Self::Out),
            "1" => Some(Self::In),
            _ => None,
        }
    }

    /// Lenient parse used by bulk import: anything unexpected becomes `Out`.
    pub fn coerce(value: &str) -> Self {
        Self::parse(value.trim()).unwrap_or_default()
    }
}

/// Normalized member fields as handed to the store.
///
/// Identity and timestamps are owned by the store and therefore absent here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDocument {
    pub name: String,
    pub primary_phone: String,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub school: String,
    pub class_level: String,
    pub residence: String,
    pub group_flag: GroupFlag,
    pub attendance: Attendance,
}

/// Persisted member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub primary_phone: String,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub school: String,
    pub class_level: String,
    pub residence: String,
    pub group_flag: GroupFlag,
    pub attendance: Attendance,
    /// Unix epoch milliseconds. `None` only for records imported from
    /// stores that never tracked creation time.
    pub created_at: Option<i64>,
    /// Unix epoch milliseconds.
    pub updated_at: Option<i64>,
}

impl Member {
    /// Assembles a stored member from its document and store-owned metadata.
    pub fn from_document(
        id: MemberId,
        document: MemberDocument,
        created_at: Option<i64>,
        updated_at: Option<i64>,
    ) -> Self {
        Self {
            id,
            name: document.name,
            primary_phone: document.primary_phone,
            guardian_name: document.guardian_name,
            guardian_phone: document.guardian_phone,
            school: document.school,
            class_level: document.class_level,
            residence: document.residence,
            group_flag: document.group_flag,
            attendance: document.attendance,
            created_at,
            updated_at,
        }
    }

    /// Splits the record back into its document fields.
    pub fn to_document(&self) -> MemberDocument {
        MemberDocument {
            name: self.name.clone(),
            primary_phone: self.primary_phone.clone(),
            guardian_name: self.guardian_name.clone(),
            guardian_phone: self.guardian_phone.clone(),
            school: self.school.clone(),
            class_level: self.class_level.clone(),
            residence: self.residence.clone(),
            group_flag: self.group_flag,
            attendance: self.attendance.clone(),
        }
    }

    /// Returns whether the member has at least one attendance entry.
    pub fn is_active(&self) -> bool {
        !self.attendance.is_empty()
    }
}

/// Raw create input as supplied by a caller.
///
/// Phone fields carry user input; the resolution service normalizes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberDraft {
    pub name: String,
    pub primary_phone: String,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub school: String,
    pub class_level: String,
    pub residence: String,
    pub group_flag: GroupFlag,
    pub attendance: Attendance,
}

/// Partial update. `None` leaves the stored field untouched.
///
/// For the optional guardian fields, `Some(String::new())` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub primary_phone: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub school: Option<String>,
    pub class_level: Option<String>,
    pub residence: Option<String>,
    pub group_flag: Option<GroupFlag>,
    pub attendance: Option<Attendance>,
}

impl MemberPatch {
    /// Returns whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.primary_phone.is_none()
            && self.guardian_name.is_none()
            && self.guardian_phone.is_none()
            && self.school.is_none()
            && self.class_level.is_none()
            && self.residence.is_none()
            && self.group_flag.is_none()
            && self.attendance.is_none()
    }
}
