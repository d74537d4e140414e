//! SQLite-backed member store.
//!
//! # Responsibility
//! - Persist member documents in the `members` table.
//! - Encode attendance as a JSON object column.
//!
//! # Invariants
//! - Timestamps are Unix epoch milliseconds taken from the process clock.
//! - `replace_all` runs delete and insert in one transaction.

use crate::model::attendance::{is_valid_date_key, Attendance};
use crate::model::member::{GroupFlag, Member, MemberDocument, MemberId, MemberPatch};
use crate::store::{MemberField, MemberStore, ReplaceOutcome, StoreError, StoreResult};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

const MEMBER_SELECT_SQL: &str = "SELECT
    id,
    name,
    primary_phone,
    guardian_name,
    guardian_phone,
    school,
    class_level,
    residence,
    group_flag,
    attendance,
    created_at,
    updated_at
FROM members";

/// SQLite member store borrowing a migrated connection.
pub struct SqliteMemberStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMemberStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn query_members(&self, sql: &str, bind_values: Vec<Value>) -> StoreResult<Vec<Member>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut members = Vec::new();

        while let Some(row) = rows.next()? {
            members.push(parse_member_row(row)?);
        }

        Ok(members)
    }
}

impl MemberStore for SqliteMemberStore<'_> {
    fn get(&self, id: MemberId) -> StoreResult<Option<Member>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{MEMBER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_member_row(row)?));
        }

        Ok(None)
    }

    fn insert(&self, document: &MemberDocument) -> StoreResult<MemberId> {
        insert_document(self.conn, document, now_epoch_ms())
    }

    fn update(&self, id: MemberId, patch: &MemberPatch) -> StoreResult<bool> {
        let mut assignments: Vec<&'static str> = Vec::new();
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(name) = &patch.name {
            assignments.push("name = ?");
            bind_values.push(Value::Text(name.clone()));
        }
        if let Some(phone) = &patch.primary_phone {
            assignments.push("primary_phone = ?");
            bind_values.push(Value::Text(phone.clone()));
        }
        if let Some(guardian_name) = &patch.guardian_name {
            assignments.push("guardian_name = ?");
            bind_values.push(optional_text(guardian_name));
        }
        if let Some(guardian_phone) = &patch.guardian_phone {
            assignments.push("guardian_phone = ?");
            bind_values.push(optional_text(guardian_phone));
        }
        if let Some(school) = &patch.school {
            assignments.push("school = ?");
            bind_values.push(Value::Text(school.clone()));
        }
        if let Some(class_level) = &patch.class_level {
            assignments.push("class_level = ?");
            bind_values.push(Value::Text(class_level.clone()));
        }
        if let Some(residence) = &patch.residence {
            assignments.push("residence = ?");
            bind_values.push(Value::Text(residence.clone()));
        }
        if let Some(group_flag) = patch.group_flag {
            assignments.push("group_flag = ?");
            bind_values.push(Value::Text(group_flag.code().to_string()));
        }
        if let Some(attendance) = &patch.attendance {
            assignments.push("attendance = ?");
            bind_values.push(Value::Text(encode_attendance(attendance)?));
        }

        assignments.push("updated_at = ?");
        bind_values.push(Value::Integer(now_epoch_ms()));
        bind_values.push(Value::Text(id.to_string()));

        let sql = format!(
            "UPDATE members SET {} WHERE id = ?;",
            assignments.join(", ")
        );
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed > 0)
    }

    fn delete(&self, id: MemberId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM members WHERE id = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn query_equals(&self, field: MemberField, value: &str) -> StoreResult<Vec<Member>> {
        let sql = format!(
            "{MEMBER_SELECT_SQL} WHERE {} = ?1 ORDER BY rowid ASC;",
            field.column()
        );
        self.query_members(&sql, vec![Value::Text(value.to_string())])
    }

    fn query_range(&self, field: MemberField, low: &str, high: &str) -> StoreResult<Vec<Member>> {
        let column = field.column();
        let sql = format!(
            "{MEMBER_SELECT_SQL}
             WHERE {column} >= ?1 AND {column} < ?2
             ORDER BY {column} ASC, rowid ASC;"
        );
        self.query_members(
            &sql,
            vec![Value::Text(low.to_string()), Value::Text(high.to_string())],
        )
    }

    fn stream_all(&self) -> StoreResult<Vec<Member>> {
        self.query_members(&format!("{MEMBER_SELECT_SQL} ORDER BY rowid ASC;"), Vec::new())
    }

    fn batch_insert(&self, documents: &[MemberDocument]) -> StoreResult<Vec<MemberId>> {
        let tx = self.conn.unchecked_transaction()?;
        let ids = insert_all(&tx, documents)?;
        tx.commit()?;
        Ok(ids)
    }

    fn batch_delete_all(&self) -> StoreResult<usize> {
        Ok(self.conn.execute("DELETE FROM members;", [])?)
    }

    fn replace_all(&self, documents: &[MemberDocument]) -> StoreResult<ReplaceOutcome> {
        let tx = self.conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM members;", [])?;
        let inserted = insert_all(&tx, documents)?;
        tx.commit()?;
        Ok(ReplaceOutcome { deleted, inserted })
    }
}

fn insert_all(conn: &Connection, documents: &[MemberDocument]) -> StoreResult<Vec<MemberId>> {
    let now = now_epoch_ms();
    documents
        .iter()
        .map(|document| insert_document(conn, document, now))
        .collect()
}

fn insert_document(
    conn: &Connection,
    document: &MemberDocument,
    now: i64,
) -> StoreResult<MemberId> {
    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO members (
            id,
            name,
            primary_phone,
            guardian_name,
            guardian_phone,
            school,
            class_level,
            residence,
            group_flag,
            attendance,
            created_at,
            updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11);",
        params![
            id.to_string(),
            document.name.as_str(),
            document.primary_phone.as_str(),
            document.guardian_name.as_deref(),
            document.guardian_phone.as_deref(),
            document.school.as_str(),
            document.class_level.as_str(),
            document.residence.as_str(),
            document.group_flag.code(),
            encode_attendance(&document.attendance)?,
            now,
        ],
    )?;

    Ok(id)
}

fn parse_member_row(row: &Row<'_>) -> StoreResult<Member> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        StoreError::InvalidData(format!("invalid id value `{id_text}` in members.id"))
    })?;

    let flag_text: String = row.get("group_flag")?;
    let group_flag = GroupFlag::parse(&flag_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid group flag `{flag_text}` in members.group_flag"
        ))
    })?;

    let attendance_text: String = row.get("attendance")?;
    let attendance = decode_attendance(&attendance_text)?;

    let document = MemberDocument {
        name: row.get("name")?,
        primary_phone: row.get("primary_phone")?,
        guardian_name: row.get("guardian_name")?,
        guardian_phone: row.get("guardian_phone")?,
        school: row.get("school")?,
        class_level: row.get("class_level")?,
        residence: row.get("residence")?,
        group_flag,
        attendance,
    };
    Ok(Member::from_document(
        id,
        document,
        row.get("created_at")?,
        row.get("updated_at")?,
    ))
}

fn encode_attendance(attendance: &Attendance) -> StoreResult<String> {
    serde_json::to_string(attendance)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode attendance: {err}")))
}

fn decode_attendance(raw: &str) -> StoreResult<Attendance> {
    let attendance: Attendance = serde_json::from_str(raw).map_err(|err| {
        StoreError::InvalidData(format!("invalid attendance json in members.attendance: {err}"))
    })?;
    if let Some(key) = attendance.keys().find(|key| !is_valid_date_key(key)) {
        return Err(StoreError::InvalidData(format!(
            "invalid attendance date key `{key}` in members.attendance"
        )));
    }
    Ok(attendance)
}

fn optional_text(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::Text(value.to_string())
    }
}

fn now_epoch_ms() -> i64 {
    Utc::now().timestamp_millis()
}
