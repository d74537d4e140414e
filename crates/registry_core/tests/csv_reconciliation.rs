use chrono::{Duration, Utc};
use registry_core::db::open_db_in_memory;
use registry_core::{
    GroupFlag, Member, MemberDraft, MemberStore, PhoneNormalizer, ReconciliationService,
    ResolutionService, ServiceError, ServiceSlot, SqliteMemberStore, ValidationError,
};
use rusqlite::Connection;

const HEADER: &str =
    "name,primary_phone,guardian_name,guardian_phone,school,class_level,residence,group_flag";

fn reconciliation(conn: &Connection) -> ReconciliationService<SqliteMemberStore<'_>> {
    ReconciliationService::new(SqliteMemberStore::new(conn), PhoneNormalizer::default())
}

fn resolution(conn: &Connection) -> ResolutionService<SqliteMemberStore<'_>> {
    ResolutionService::new(SqliteMemberStore::new(conn), PhoneNormalizer::default())
}

fn draft(name: &str, phone: &str, school: &str, residence: &str) -> MemberDraft {
    MemberDraft {
        name: name.to_string(),
        primary_phone: phone.to_string(),
        school: school.to_string(),
        class_level: "P6".to_string(),
        residence: residence.to_string(),
        ..MemberDraft::default()
    }
}

fn seed(conn: &Connection) {
    let service = resolution(conn);
    let mut amina = draft("Amina Nakato", "0781234567", "Kampala Primary School", "Lubowa");
    amina.guardian_name = Some("Sarah Nakato".to_string());
    amina.guardian_phone = Some("0772000111".to_string());
    amina.group_flag = GroupFlag::In;
    let amina = service.create(&amina).unwrap();
    service
        .add_attendance(amina, "05_01_2025", ServiceSlot::First)
        .unwrap();
    service
        .add_attendance(amina, "12_01_2025", ServiceSlot::Third)
        .unwrap();

    let peter = service
        .create(&draft("Peter Okello", "+14155551234", "Kampala Primary School", "Entebbe"))
        .unwrap();
    service
        .add_attendance(peter, "12_01_2025", ServiceSlot::Second)
        .unwrap();

    service
        .create(&draft("Grace Auma", "0701234567", "Lubowa Hill College", "Lubowa"))
        .unwrap();
}

fn sorted_members(conn: &Connection) -> Vec<Member> {
    let mut members = SqliteMemberStore::new(conn).stream_all().unwrap();
    members.sort_by(|left, right| left.name.cmp(&right.name));
    members
}

#[test]
fn export_of_empty_collection_is_empty() {
    let conn = open_db_in_memory().unwrap();
    assert_eq!(reconciliation(&conn).export_all().unwrap(), "");
}

#[test]
fn export_header_is_sorted_union_with_blank_gaps() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let text = reconciliation(&conn).export_all().unwrap();
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .unwrap()
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let mut sorted = headers.clone();
    sorted.sort();
    assert_eq!(headers, sorted);
    assert!(headers.contains(&"attendance_05_01_2025".to_string()));
    assert!(headers.contains(&"attendance_12_01_2025".to_string()));
    assert!(headers.contains(&"id".to_string()));

    let column = headers
        .iter()
        .position(|header| header == "attendance_05_01_2025")
        .unwrap();
    let name = headers.iter().position(|header| header == "name").unwrap();
    let rows = reader.records().map(Result::unwrap).collect::<Vec<_>>();
    assert_eq!(rows.len(), 3);
    for row in &rows {
        let expected = if &row[name] == "Amina Nakato" { "1" } else { "" };
        assert_eq!(&row[column], expected);
    }
}

#[test]
fn export_then_import_preserves_members() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let before = sorted_members(&conn);

    let service = reconciliation(&conn);
    let text = service.export_all().unwrap();
    let report = service.import_csv(&text).unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.deleted, 3);
    assert!(report.errors.is_empty());

    let after = sorted_members(&conn);
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.to_document(), new.to_document());
    }
}

#[test]
fn import_skips_bad_rows_and_replaces_collection() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let text = format!(
        "{HEADER}\n\
         Alice Namara,0781111111,,,Kampala Primary School,P5,Lubowa,1\n\
         ,0782222222,,,Kampala Primary School,P5,Lubowa,0\n\
         Brian Ssali,0783333333,,,Kampala Primary School,P5,Munyonyo,0\n\
         Carol Atim,0784444444,,,Kampala Primary School,P5,Entebbe,0\n"
    );
    let report = reconciliation(&conn).import_csv(&text).unwrap();

    assert_eq!(report.imported, 3);
    assert_eq!(report.deleted, 3);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Row 2:"));

    let names = sorted_members(&conn)
        .into_iter()
        .map(|member| member.name)
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Alice Namara", "Brian Ssali", "Carol Atim"]);
}

#[test]
fn import_without_data_rows_leaves_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = reconciliation(&conn);

    for text in ["", HEADER] {
        let err = service.import_csv(text).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::NoDataRows)
        ));
    }
    assert_eq!(sorted_members(&conn).len(), 3);
}

#[test]
fn import_with_only_invalid_rows_leaves_store_untouched() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);

    let text = format!(
        "{HEADER}\n\
         A,0781111111,,,Kampala Primary School,P5,Lubowa,0\n\
         Brian Ssali,12345,,,Kampala Primary School,P5,Lubowa,0\n\
         Carol Atim,0784444444,,,,P5,Lubowa,0\n"
    );
    let err = reconciliation(&conn).import_csv(&text).unwrap_err();
    match err {
        ServiceError::Validation(ValidationError::NoValidRows { errors }) => {
            assert_eq!(errors.len(), 3);
            assert!(errors[2].starts_with("Row 3:"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(sorted_members(&conn).len(), 3);
}

#[test]
fn import_cleans_optional_and_coerced_fields() {
    let conn = open_db_in_memory().unwrap();

    let text = "name,primary_phone,guardian_phone,school,class_level,residence,group_flag,\
                attendance_05_01_2025,attendance_12_01_2025,attendance_2025-01-19\n\
                Alice Namara,+256 781 111 111,12,Kampala Primary School,P5,Lubowa,yes,2,4,1\n";
    let report = reconciliation(&conn).import_csv(text).unwrap();
    assert_eq!(report.imported, 1);
    assert_eq!(report.deleted, 0);

    let member = sorted_members(&conn).remove(0);
    assert_eq!(member.primary_phone, "781111111");
    assert!(member.guardian_phone.is_none());
    assert_eq!(member.group_flag, GroupFlag::Out);
    assert_eq!(member.attendance.len(), 1);
    assert_eq!(
        member.attendance.get("05_01_2025"),
        Some(&ServiceSlot::Second)
    );
}

#[test]
fn import_accepts_legacy_spreadsheet_headers() {
    let conn = open_db_in_memory().unwrap();

    let text = "ID,Name,MorphersNumber,ParentsName,ParentsNumber,School,Class,Residence,Cell,\
                createdAt,lastUpdated,attendance_05_01_2025\n\
                old-id,Amina Nakato,0781234567,Sarah Nakato,0772000111,Kampala Primary School,\
                P6,Lubowa,1,,,3\n";
    let report = reconciliation(&conn).import_csv(text).unwrap();
    assert_eq!(report.imported, 1);

    let member = sorted_members(&conn).remove(0);
    assert_eq!(member.name, "Amina Nakato");
    assert_eq!(member.guardian_name.as_deref(), Some("Sarah Nakato"));
    assert_eq!(member.guardian_phone.as_deref(), Some("772000111"));
    assert_eq!(member.group_flag, GroupFlag::In);
    assert_eq!(member.attendance.get("05_01_2025"), Some(&ServiceSlot::Third));
}

#[test]
fn statistics_aggregate_one_scan() {
    let conn = open_db_in_memory().unwrap();
    let service = reconciliation(&conn);

    let empty = service.compute_statistics().unwrap();
    assert_eq!(empty.total_members, 0);
    assert_eq!(empty.by_group_flag.get("0"), Some(&0));
    assert_eq!(empty.by_service.get("3"), Some(&0));

    seed(&conn);
    let stats = service.compute_statistics_at(Utc::now()).unwrap();
    assert_eq!(stats.total_members, 3);
    assert_eq!(stats.active_members, 2);
    assert_eq!(stats.recent_registrations, 3);
    assert_eq!(stats.by_group_flag.get("1"), Some(&1));
    assert_eq!(stats.by_group_flag.get("0"), Some(&2));
    assert_eq!(stats.by_service.get("1"), Some(&1));
    assert_eq!(stats.by_service.get("2"), Some(&1));
    assert_eq!(stats.by_service.get("3"), Some(&1));
    assert_eq!(stats.by_school.get("Kampala Primary School"), Some(&2));
    assert_eq!(stats.by_residence.get("Lubowa"), Some(&2));

    let later = service
        .compute_statistics_at(Utc::now() + Duration::days(31))
        .unwrap();
    assert_eq!(later.recent_registrations, 0);
}

#[test]
fn international_phones_survive_export_then_import() {
    let conn = open_db_in_memory().unwrap();
    let service = resolution(&conn);

    service
        .create(&draft("Oliver Grant", "+44 20 7946 0958", "Kampala Primary School", "Kololo"))
        .unwrap();
    let mut amina = draft("Amina Nakato", "0781234567", "Kampala Primary School", "Lubowa");
    amina.guardian_phone = Some("+1 234 567 890".to_string());
    service.create(&amina).unwrap();

    // Nine digits behind a `+` is too short for a foreign number.
    let err = service
        .create(&draft("Brian Ssali", "+123456789", "Kampala Primary School", "Lubowa"))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::InvalidPhone { .. })
    ));

    let before = sorted_members(&conn);
    let reconciliation = reconciliation(&conn);
    let text = reconciliation.export_all().unwrap();
    let report = reconciliation.import_csv(&text).unwrap();
    assert_eq!(report.imported, 2);
    assert!(report.errors.is_empty(), "{:?}", report.errors);

    let after = sorted_members(&conn);
    assert_eq!(after[0].guardian_phone.as_deref(), Some("1234567890"));
    assert_eq!(after[1].primary_phone, "442079460958");
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.to_document(), new.to_document());
    }
}
