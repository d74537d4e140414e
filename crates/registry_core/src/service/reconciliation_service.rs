//! Bulk CSV import/export and collection statistics.
//!
//! # Responsibility
//! - Flatten members (including per-date attendance) into CSV and back.
//! - Replace the whole collection from a CSV dump, skipping bad rows.
//! - Aggregate registry statistics from one full scan.
//!
//! # Invariants
//! - Export headers are the sorted union of fixed and attendance columns.
//! - Import is a full replace, never a merge; nothing is written unless at
//!   least one row validates.
//! - Row-level failures are reported, not raised.

use crate::model::attendance::{is_valid_date_key, Attendance, ServiceSlot};
use crate::model::member::{GroupFlag, Member, MemberDocument};
use crate::model::validation::ValidationError;
use crate::phone::PhoneNormalizer;
use crate::service::{store_failure, ServiceError, ServiceResult};
use crate::store::MemberStore;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use log::{info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const MODULE: &str = "reconciliation";
const ATTENDANCE_PREFIX: &str = "attendance_";
const DEFAULT_RECENT_WINDOW_DAYS: u32 = 30;
const MIN_IMPORT_NAME_CHARS: usize = 2;

/// Fixed member columns of the interchange format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Column {
    Id,
    Name,
    PrimaryPhone,
    GuardianName,
    GuardianPhone,
    School,
    ClassLevel,
    Residence,
    GroupFlag,
    CreatedAt,
    UpdatedAt,
}

impl Column {
    const ALL: [Column; 11] = [
        Self::Id,
        Self::Name,
        Self::PrimaryPhone,
        Self::GuardianName,
        Self::GuardianPhone,
        Self::School,
        Self::ClassLevel,
        Self::Residence,
        Self::GroupFlag,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    fn header(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::PrimaryPhone => "primary_phone",
            Self::GuardianName => "guardian_name",
            Self::GuardianPhone => "guardian_phone",
            Self::School => "school",
            Self::ClassLevel => "class_level",
            Self::Residence => "residence",
            Self::GroupFlag => "group_flag",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Resolves a header, accepting the legacy spreadsheet names.
    fn from_header(header: &str) -> Option<Self> {
        let column = match header.trim() {
            "id" | "ID" => Self::Id,
            "name" | "Name" => Self::Name,
            "primary_phone" | "MorphersNumber" => Self::PrimaryPhone,
            "guardian_name" | "ParentsName" => Self::GuardianName,
            "guardian_phone" | "ParentsNumber" => Self::GuardianPhone,
            "school" | "School" => Self::School,
            "class_level" | "Class" => Self::ClassLevel,
            "residence" | "Residence" => Self::Residence,
            "group_flag" | "Cell" => Self::GroupFlag,
            "created_at" | "createdAt" => Self::CreatedAt,
            "updated_at" | "lastUpdated" => Self::UpdatedAt,
            _ => return None,
        };
        Some(column)
    }
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Members written by this import.
    pub imported: usize,
    /// Members removed before writing.
    pub deleted: usize,
    /// `Row N: reason` for every skipped row (1-based data row numbers).
    pub errors: Vec<String>,
}

/// Aggregate counts over the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberStatistics {
    pub total_members: usize,
    /// Members with at least one attendance entry.
    pub active_members: usize,
    /// Members created inside the recent-registration window.
    pub recent_registrations: usize,
    /// Keyed by group flag code (`"0"`, `"1"`).
    pub by_group_flag: BTreeMap<String, usize>,
    /// Attendance entries keyed by slot code (`"1"`, `"2"`, `"3"`).
    pub by_service: BTreeMap<String, usize>,
    pub by_school: BTreeMap<String, usize>,
    pub by_residence: BTreeMap<String, usize>,
}

impl MemberStatistics {
    fn empty() -> Self {
        Self {
            total_members: 0,
            active_members: 0,
            recent_registrations: 0,
            by_group_flag: [GroupFlag::Out, GroupFlag::In]
                .iter()
                .map(|flag| (flag.code().to_string(), 0))
                .collect(),
            by_service: ServiceSlot::ALL
                .iter()
                .map(|slot| (slot.code().to_string(), 0))
                .collect(),
            by_school: BTreeMap::new(),
            by_residence: BTreeMap::new(),
        }
    }
}

/// Reconciliation engine over a member store.
pub struct ReconciliationService<S: MemberStore> {
    store: S,
    phones: PhoneNormalizer,
    recent_window_days: u32,
}

impl<S: MemberStore> ReconciliationService<S> {
    pub fn new(store: S, phones: PhoneNormalizer) -> Self {
        Self {
            store,
            phones,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
        }
    }

    /// Overrides the recent-registration window used by statistics.
    pub fn with_recent_window_days(mut self, days: u32) -> Self {
        self.recent_window_days = days;
        self
    }

    /// Serializes every member to CSV.
    ///
    /// Returns an empty string, without header, when the collection is empty.
    pub fn export_all(&self) -> ServiceResult<String> {
        let members = self
            .store
            .stream_all()
            .map_err(store_failure(MODULE, "csv_export", "members"))?;
        if members.is_empty() {
            info!("event=csv_export module={MODULE} status=ok rows=0");
            return Ok(String::new());
        }

        let records = members.iter().map(flatten_member).collect::<Vec<_>>();
        let headers = records
            .iter()
            .flat_map(|record| record.keys().cloned())
            .collect::<BTreeSet<_>>();

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&headers).map_err(csv_failure("csv_export"))?;
        for record in &records {
            let row = headers
                .iter()
                .map(|header| record.get(header).map(String::as_str).unwrap_or(""));
            writer.write_record(row).map_err(csv_failure("csv_export"))?;
        }
        let bytes = writer.into_inner().map_err(|err| ServiceError::Csv {
            operation: "csv_export",
            message: err.to_string(),
        })?;
        let text = String::from_utf8(bytes).map_err(|err| ServiceError::Csv {
            operation: "csv_export",
            message: err.to_string(),
        })?;

        info!(
            "event=csv_export module={MODULE} status=ok rows={} columns={}",
            records.len(),
            headers.len()
        );
        Ok(text)
    }

    /// Replaces the entire collection with the valid rows of `text`.
    ///
    /// # Errors
    /// - `ValidationError::NoDataRows` when the CSV has no data rows.
    /// - `ValidationError::NoValidRows` when every row was rejected.
    ///
    /// In both cases the collection is left untouched.
    pub fn import_csv(&self, text: &str) -> ServiceResult<ImportReport> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers = reader.headers().map_err(csv_failure("csv_import"))?.clone();
        let layout = ImportLayout::from_headers(&headers);

        let mut documents = Vec::new();
        let mut errors = Vec::new();
        let mut rows_seen = 0usize;

        for (index, record) in reader.records().enumerate() {
            rows_seen += 1;
            let row_number = index + 1;
            let parsed = record
                .map_err(|err| err.to_string())
                .and_then(|record| {
                    self.parse_row(&layout, &record)
                        .map_err(|err| err.to_string())
                });
            match parsed {
                Ok(document) => documents.push(document),
                Err(reason) => errors.push(format!("Row {row_number}: {reason}")),
            }
        }

        if rows_seen == 0 {
            warn!("event=csv_import module={MODULE} status=rejected reason=no_data_rows");
            return Err(ValidationError::NoDataRows.into());
        }
        if documents.is_empty() {
            warn!(
                "event=csv_import module={MODULE} status=rejected reason=no_valid_rows rejected={}",
                errors.len()
            );
            return Err(ValidationError::NoValidRows { errors }.into());
        }

        info!(
            "event=csv_import module={MODULE} status=start rows={rows_seen} valid={}",
            documents.len()
        );
        let outcome = self
            .store
            .replace_all(&documents)
            .map_err(store_failure(MODULE, "csv_import", "members"))?;

        let report = ImportReport {
            imported: outcome.inserted.len(),
            deleted: outcome.deleted,
            errors,
        };
        info!(
            "event=csv_import module={MODULE} status=ok imported={} deleted={} rejected={}",
            report.imported,
            report.deleted,
            report.errors.len()
        );
        Ok(report)
    }

    /// Computes statistics relative to the current time.
    pub fn compute_statistics(&self) -> ServiceResult<MemberStatistics> {
        self.compute_statistics_at(Utc::now())
    }

    /// Computes statistics relative to `now`.
    pub fn compute_statistics_at(&self, now: DateTime<Utc>) -> ServiceResult<MemberStatistics> {
        let members = self
            .store
            .stream_all()
            .map_err(store_failure(MODULE, "statistics", "members"))?;
        let recent_cutoff =
            (now - Duration::days(i64::from(self.recent_window_days))).timestamp_millis();

        let mut stats = MemberStatistics::empty();
        stats.total_members = members.len();

        for member in &members {
            *stats
                .by_group_flag
                .entry(member.group_flag.code().to_string())
                .or_insert(0) += 1;

            if member
                .created_at
                .is_some_and(|created_at| created_at > recent_cutoff)
            {
                stats.recent_registrations += 1;
            }

            if member.is_active() {
                stats.active_members += 1;
                for slot in member.attendance.values() {
                    *stats.by_service.entry(slot.code().to_string()).or_insert(0) += 1;
                }
            }

            count_label(&mut stats.by_school, &member.school);
            count_label(&mut stats.by_residence, &member.residence);
        }

        info!(
            "event=statistics module={MODULE} status=ok total={} active={}",
            stats.total_members, stats.active_members
        );
        Ok(stats)
    }

    fn parse_row(
        &self,
        layout: &ImportLayout,
        record: &csv::StringRecord,
    ) -> Result<MemberDocument, ValidationError> {
        let name = layout.value(record, Column::Name);
        if name.chars().count() < MIN_IMPORT_NAME_CHARS {
            return Err(ValidationError::NameTooShort);
        }

        let primary_phone = layout.value(record, Column::PrimaryPhone);
        if primary_phone.is_empty() {
            return Err(ValidationError::MissingField("primary phone"));
        }
        if !self.phones.is_valid(primary_phone) {
            return Err(ValidationError::InvalidPhone {
                field: "primary phone",
                value: primary_phone.to_string(),
            });
        }

        let school = required(layout, record, Column::School, "school")?;
        let class_level = required(layout, record, Column::ClassLevel, "class")?;
        let residence = required(layout, record, Column::Residence, "residence")?;

        let guardian_name = layout.value(record, Column::GuardianName);
        let guardian_phone = layout.value(record, Column::GuardianPhone);
        // An unusable optional guardian number is dropped, not fatal.
        let guardian_phone = if !guardian_phone.is_empty() && self.phones.is_valid(guardian_phone)
        {
            Some(self.phones.normalize(guardian_phone))
        } else {
            None
        };

        let mut attendance = Attendance::new();
        for (date_key, index) in &layout.attendance {
            let value = record.get(*index).unwrap_or("").trim();
            if value.is_empty() || !is_valid_date_key(date_key) {
                continue;
            }
            if let Some(slot) = ServiceSlot::parse(value) {
                attendance.insert(date_key.clone(), slot);
            }
        }

        Ok(MemberDocument {
            name: name.to_string(),
            primary_phone: self.phones.normalize(primary_phone),
            guardian_name: (!guardian_name.is_empty()).then(|| guardian_name.to_string()),
            guardian_phone,
            school,
            class_level,
            residence,
            group_flag: GroupFlag::coerce(layout.value(record, Column::GroupFlag)),
            attendance,
        })
    }
}

/// Header-driven column positions for one import.
struct ImportLayout {
    fixed: HashMap<Column, usize>,
    attendance: Vec<(String, usize)>,
}

impl ImportLayout {
    fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut fixed = HashMap::new();
        let mut attendance = Vec::new();

        for (index, header) in headers.iter().enumerate() {
            let header = header.trim().trim_start_matches('\u{feff}');
            if let Some(date_key) = header.strip_prefix(ATTENDANCE_PREFIX) {
                attendance.push((date_key.to_string(), index));
            } else if let Some(column) = Column::from_header(header) {
                fixed.entry(column).or_insert(index);
            }
        }

        Self { fixed, attendance }
    }

    /// Trimmed cell for `column`, empty when the column or cell is absent.
    fn value<'r>(&self, record: &'r csv::StringRecord, column: Column) -> &'r str {
        self.fixed
            .get(&column)
            .and_then(|index| record.get(*index))
            .unwrap_or("")
            .trim()
    }
}

fn required(
    layout: &ImportLayout,
    record: &csv::StringRecord,
    column: Column,
    field: &'static str,
) -> Result<String, ValidationError> {
    let value = layout.value(record, column);
    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(value.to_string())
}

fn flatten_member(member: &Member) -> BTreeMap<String, String> {
    let mut record = BTreeMap::new();
    for column in Column::ALL {
        let value = match column {
            Column::Id => member.id.to_string(),
            Column::Name => member.name.clone(),
            Column::PrimaryPhone => member.primary_phone.clone(),
            Column::GuardianName => member.guardian_name.clone().unwrap_or_default(),
            Column::GuardianPhone => member.guardian_phone.clone().unwrap_or_default(),
            Column::School => member.school.clone(),
            Column::ClassLevel => member.class_level.clone(),
            Column::Residence => member.residence.clone(),
            Column::GroupFlag => member.group_flag.code().to_string(),
            Column::CreatedAt => format_timestamp(member.created_at),
            Column::UpdatedAt => format_timestamp(member.updated_at),
        };
        record.insert(column.header().to_string(), value);
    }

    for (date_key, slot) in &member.attendance {
        record.insert(
            format!("{ATTENDANCE_PREFIX}{date_key}"),
            slot.code().to_string(),
        );
    }
    record
}

fn format_timestamp(epoch_ms: Option<i64>) -> String {
    epoch_ms
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map(|timestamp| timestamp.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn count_label(counts: &mut BTreeMap<String, usize>, label: &str) {
    let label = label.trim();
    if !label.is_empty() {
        *counts.entry(label.to_string()).or_insert(0) += 1;
    }
}

fn csv_failure(operation: &'static str) -> impl Fn(csv::Error) -> ServiceError {
    move |err| ServiceError::Csv {
        operation,
        message: err.to_string(),
    }
}
