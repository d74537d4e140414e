//! Member identity resolution and single-record mutations.
//!
//! # Responsibility
//! - Answer "is this person already registered?" from a first name and a
//!   phone number.
//! - Create and patch members with validated, normalized fields.
//! - Maintain per-date attendance.
//!
//! # Invariants
//! - Phone fields reach the store only in canonical form.
//! - Attendance mutations are read-modify-write without concurrency control:
//!   concurrent writers on one member race and the last write wins.
//! - Missing members yield `false` / empty results, never errors.

use crate::matching::{char_prefix, matches_contains, matches_prefix, prefix_range};
use crate::model::attendance::{date_key, parse_date_key, Attendance, ServiceSchedule, ServiceSlot};
use crate::model::member::{Member, MemberDocument, MemberDraft, MemberId, MemberPatch};
use crate::model::validation::{validate_full_name, validate_school, ValidationError};
use crate::phone::PhoneNormalizer;
use crate::service::{store_failure, ServiceResult};
use crate::store::{MemberField, MemberStore};
use chrono::NaiveDateTime;
use log::{debug, info};
use std::collections::HashSet;

const MODULE: &str = "resolution";
const MIN_PREFIX_CHARS: usize = 3;

/// Resolution engine over a member store.
pub struct ResolutionService<S: MemberStore> {
    store: S,
    phones: PhoneNormalizer,
    schedule: ServiceSchedule,
}

impl<S: MemberStore> ResolutionService<S> {
    pub fn new(store: S, phones: PhoneNormalizer) -> Self {
        Self {
            store,
            phones,
            schedule: ServiceSchedule::default(),
        }
    }

    /// Replaces the service schedule used by [`Self::check_in`].
    pub fn with_schedule(mut self, schedule: ServiceSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Finds the registered member matching a first name and phone number.
    ///
    /// Phone candidates (primary or guardian number) are tried first, by name
    /// prefix and then by substring. When neither resolves, the name token is
    /// shortened one character at a time down to three characters and each
    /// prefix is range-queried, filtered by phone when one was given.
    /// Among equally ranked candidates the store's order decides.
    pub fn search(&self, first_name: &str, phone_raw: &str) -> ServiceResult<Option<Member>> {
        let token = first_name.trim();
        let phone = self.phones.normalize(phone_raw);

        let candidates = self.phone_candidates(&phone)?;
        let by_phone = candidates
            .iter()
            .find(|member| matches_prefix(&member.name, token))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|member| matches_contains(&member.name, token))
            });
        if let Some(member) = by_phone {
            info!(
                "event=member_search module={MODULE} status=ok outcome=phone_match candidates={}",
                candidates.len()
            );
            return Ok(Some(member.clone()));
        }

        let token_chars = token.chars().count();
        for length in (MIN_PREFIX_CHARS..=token_chars).rev() {
            let prefix = char_prefix(token, length);
            let (low, high) = prefix_range(prefix);
            let matches = self
                .store
                .query_range(MemberField::Name, &low, &high)
                .map_err(store_failure(MODULE, "member_search", format!("prefix_len={length}")))?;

            let found = matches
                .into_iter()
                .find(|member| phone.is_empty() || has_phone(member, &phone));
            if let Some(member) = found {
                info!(
                    "event=member_search module={MODULE} status=ok outcome=prefix_match prefix_len={length}"
                );
                return Ok(Some(member));
            }
            debug!("event=member_search module={MODULE} status=miss prefix_len={length}");
        }

        info!("event=member_search module={MODULE} status=ok outcome=not_found");
        Ok(None)
    }

    /// Validates and persists a new member, returning its store-assigned id.
    pub fn create(&self, draft: &MemberDraft) -> ServiceResult<MemberId> {
        let document = self.prepare_document(draft)?;
        let id = self
            .store
            .insert(&document)
            .map_err(store_failure(MODULE, "member_create", "new"))?;
        info!("event=member_create module={MODULE} status=ok member_id={id}");
        Ok(id)
    }

    /// Gets one member by id.
    pub fn get_member(&self, id: MemberId) -> ServiceResult<Option<Member>> {
        self.store
            .get(id)
            .map_err(store_failure(MODULE, "member_get", id))
    }

    /// Applies the supplied fields only. Returns `false` when `id` is unknown.
    pub fn update(&self, id: MemberId, patch: &MemberPatch) -> ServiceResult<bool> {
        let normalized = self.prepare_patch(patch)?;
        let updated = self
            .store
            .update(id, &normalized)
            .map_err(store_failure(MODULE, "member_update", id))?;
        info!("event=member_update module={MODULE} status=ok member_id={id} found={updated}");
        Ok(updated)
    }

    /// Deletes a member. Returns `false` when `id` is unknown.
    pub fn delete(&self, id: MemberId) -> ServiceResult<bool> {
        let deleted = self
            .store
            .delete(id)
            .map_err(store_failure(MODULE, "member_delete", id))?;
        info!("event=member_delete module={MODULE} status=ok member_id={id} found={deleted}");
        Ok(deleted)
    }

    /// Records `slot` for `date_key`, replacing any slot already recorded that day.
    pub fn add_attendance(
        &self,
        id: MemberId,
        date_key: &str,
        slot: ServiceSlot,
    ) -> ServiceResult<bool> {
        if parse_date_key(date_key).is_none() {
            return Err(ValidationError::InvalidDateKey(date_key.to_string()).into());
        }

        let Some(member) = self.get_for("attendance_add", id)? else {
            return Ok(false);
        };

        let mut attendance = member.attendance;
        attendance.insert(date_key.to_string(), slot);
        self.write_attendance("attendance_add", id, attendance)
    }

    /// Removes the entry for `date_key`.
    ///
    /// Returns `false` when the member is unknown or has no entry that day.
    pub fn remove_attendance(&self, id: MemberId, date_key: &str) -> ServiceResult<bool> {
        let Some(member) = self.get_for("attendance_remove", id)? else {
            return Ok(false);
        };

        let mut attendance = member.attendance;
        if attendance.remove(date_key).is_none() {
            return Ok(false);
        }
        self.write_attendance("attendance_remove", id, attendance)
    }

    /// Returns the member's attendance, or an empty map for unknown ids.
    pub fn get_attendance(&self, id: MemberId) -> ServiceResult<Attendance> {
        Ok(self
            .get_for("attendance_get", id)?
            .map(|member| member.attendance)
            .unwrap_or_default())
    }

    /// Marks attendance for the service running at `at`.
    ///
    /// Returns the recorded slot, or `None` when `at` falls outside every
    /// service window or the member is unknown.
    pub fn check_in(&self, id: MemberId, at: NaiveDateTime) -> ServiceResult<Option<ServiceSlot>> {
        let Some(slot) = self.schedule.slot_at(at.time()) else {
            debug!("event=attendance_check_in module={MODULE} status=skip reason=outside_service");
            return Ok(None);
        };
        let recorded = self.add_attendance(id, &date_key(at.date()), slot)?;
        Ok(recorded.then_some(slot))
    }

    fn phone_candidates(&self, phone: &str) -> ServiceResult<Vec<Member>> {
        if phone.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for field in [MemberField::PrimaryPhone, MemberField::GuardianPhone] {
            let members = self
                .store
                .query_equals(field, phone)
                .map_err(store_failure(MODULE, "member_search", field.column()))?;
            for member in members {
                if seen.insert(member.id) {
                    candidates.push(member);
                }
            }
        }
        Ok(candidates)
    }

    fn get_for(&self, operation: &'static str, id: MemberId) -> ServiceResult<Option<Member>> {
        self.store
            .get(id)
            .map_err(store_failure(MODULE, operation, id))
    }

    fn write_attendance(
        &self,
        operation: &'static str,
        id: MemberId,
        attendance: Attendance,
    ) -> ServiceResult<bool> {
        let patch = MemberPatch {
            attendance: Some(attendance),
            ..MemberPatch::default()
        };
        let written = self
            .store
            .update(id, &patch)
            .map_err(store_failure(MODULE, operation, id))?;
        info!("event={operation} module={MODULE} status=ok member_id={id} found={written}");
        Ok(written)
    }

    fn prepare_document(&self, draft: &MemberDraft) -> Result<MemberDocument, ValidationError> {
        validate_full_name(&draft.name)?;
        let school = validate_school(&draft.school)?;
        let primary_phone = self.required_phone("primary phone", &draft.primary_phone)?;
        let guardian_phone = match draft.guardian_phone.as_deref() {
            Some(raw) => self.optional_phone("guardian phone", raw)?,
            None => None,
        };
        validate_attendance_keys(&draft.attendance)?;

        Ok(MemberDocument {
            name: draft.name.trim().to_string(),
            primary_phone,
            guardian_name: draft.guardian_name.as_deref().and_then(non_blank),
            guardian_phone,
            school,
            class_level: draft.class_level.trim().to_string(),
            residence: draft.residence.trim().to_string(),
            group_flag: draft.group_flag,
            attendance: draft.attendance.clone(),
        })
    }

    fn prepare_patch(&self, patch: &MemberPatch) -> Result<MemberPatch, ValidationError> {
        let name = match &patch.name {
            Some(name) => {
                validate_full_name(name)?;
                Some(name.trim().to_string())
            }
            None => None,
        };
        let school = match &patch.school {
            Some(school) => Some(validate_school(school)?),
            None => None,
        };
        let primary_phone = match &patch.primary_phone {
            Some(raw) => Some(self.required_phone("primary phone", raw)?),
            None => None,
        };
        // Some("") clears the stored guardian phone.
        let guardian_phone = match &patch.guardian_phone {
            Some(raw) => Some(self.optional_phone("guardian phone", raw)?.unwrap_or_default()),
            None => None,
        };
        if let Some(attendance) = &patch.attendance {
            validate_attendance_keys(attendance)?;
        }

        Ok(MemberPatch {
            name,
            primary_phone,
            guardian_name: patch
                .guardian_name
                .as_ref()
                .map(|value| value.trim().to_string()),
            guardian_phone,
            school,
            class_level: patch
                .class_level
                .as_ref()
                .map(|value| value.trim().to_string()),
            residence: patch
                .residence
                .as_ref()
                .map(|value| value.trim().to_string()),
            group_flag: patch.group_flag,
            attendance: patch.attendance.clone(),
        })
    }

    fn required_phone(&self, field: &'static str, raw: &str) -> Result<String, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::MissingField(field));
        }
        if !self.phones.is_valid(raw) {
            return Err(ValidationError::InvalidPhone {
                field,
                value: raw.trim().to_string(),
            });
        }
        Ok(self.phones.normalize(raw))
    }

    fn optional_phone(
        &self,
        field: &'static str,
        raw: &str,
    ) -> Result<Option<String>, ValidationError> {
        if raw.trim().is_empty() {
            return Ok(None);
        }
        self.required_phone(field, raw).map(Some)
    }
}

fn has_phone(member: &Member, phone: &str) -> bool {
    member.primary_phone == phone || member.guardian_phone.as_deref() == Some(phone)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn validate_attendance_keys(attendance: &Attendance) -> Result<(), ValidationError> {
    match attendance.keys().find(|key| parse_date_key(key).is_none()) {
        Some(key) => Err(ValidationError::InvalidDateKey(key.clone())),
        None => Ok(()),
    }
}
