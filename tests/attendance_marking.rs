mod test_support;

use serde_json::json;
use test_support::{add_student, bootstrap_teacher, request_err, request_ok, spawn_sidecar, temp_dir};

fn sheet_status_by_student(sheet: &serde_json::Value) -> Vec<(String, Option<String>)> {
    sheet
        .get("students")
        .and_then(|v| v.as_array())
        .expect("students")
        .iter()
        .map(|row| {
            let id = row.get("id").and_then(|v| v.as_str()).expect("id").to_string();
            let status = row
                .get("attendance")
                .filter(|a| !a.is_null())
                .and_then(|a| a.get("status"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            (id, status)
        })
        .collect()
}

#[test]
fn remarking_overwrites_without_duplicating() {
    let workspace = temp_dir("schoolerp-attendance-upsert");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _teacher = bootstrap_teacher(&mut stdin, &mut reader, &workspace);

    let s1 = add_student(&mut stdin, &mut reader, "1", "Asha Rao", "5A", 1);
    let s2 = add_student(&mut stdin, &mut reader, "2", "Bilal Khan", "5A", 2);

    let marked = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({
            "records": [
                { "studentId": s1, "status": "Present" },
                { "studentId": s2, "status": "Absent" }
            ],
            "date": "2024-01-15"
        }),
    );
    assert_eq!(marked.get("marked").and_then(|v| v.as_u64()), Some(2));

    // Re-mark one student for the same date: last write wins, no duplicate row.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.mark",
        json!({
            "records": [ { "studentId": s1, "status": "Absent" } ],
            "date": "2024-01-15"
        }),
    );

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.sheet",
        json!({ "date": "2024-01-15" }),
    );
    let statuses = sheet_status_by_student(&sheet);
    assert_eq!(
        statuses,
        vec![
            (s1.clone(), Some("Absent".to_string())),
            (s2.clone(), Some("Absent".to_string())),
        ]
    );

    let history = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.history",
        json!({ "studentId": s1 }),
    );
    let records = history.get("records").and_then(|v| v.as_array()).expect("records");
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].get("status").and_then(|v| v.as_str()),
        Some("Absent")
    );
    assert_eq!(
        records[0].get("markedByName").and_then(|v| v.as_str()),
        Some("John Doe")
    );
}

#[test]
fn empty_batch_fails_with_zero_writes() {
    let workspace = temp_dir("schoolerp-attendance-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _teacher = bootstrap_teacher(&mut stdin, &mut reader, &workspace);
    let s1 = add_student(&mut stdin, &mut reader, "1", "Asha Rao", "5A", 1);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({ "records": [], "date": "2024-01-15" }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("invalid_input"));

    let sheet = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.sheet",
        json!({ "date": "2024-01-15" }),
    );
    assert_eq!(sheet_status_by_student(&sheet), vec![(s1, None)]);
}

#[test]
fn malformed_date_and_unknown_status_are_rejected() {
    let workspace = temp_dir("schoolerp-attendance-invalid");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _teacher = bootstrap_teacher(&mut stdin, &mut reader, &workspace);
    let s1 = add_student(&mut stdin, &mut reader, "1", "Asha Rao", "5A", 1);

    let bad_date = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({
            "records": [ { "studentId": s1, "status": "Present" } ],
            "date": "15/01/2024"
        }),
    );
    assert_eq!(bad_date.get("code").and_then(|v| v.as_str()), Some("invalid_input"));

    let bad_status = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.mark",
        json!({
            "records": [ { "studentId": s1, "status": "Sleeping" } ],
            "date": "2024-01-15"
        }),
    );
    assert_eq!(bad_status.get("code").and_then(|v| v.as_str()), Some("invalid_input"));
}

#[test]
fn marking_unknown_student_is_a_classified_store_error() {
    let workspace = temp_dir("schoolerp-attendance-fk");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _teacher = bootstrap_teacher(&mut stdin, &mut reader, &workspace);

    let error = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.mark",
        json!({
            "records": [ { "studentId": "no-such-student", "status": "Present" } ],
            "date": "2024-01-15"
        }),
    );
    assert_eq!(error.get("code").and_then(|v| v.as_str()), Some("store_error"));
    assert_eq!(
        error
            .get("details")
            .and_then(|d| d.get("classification"))
            .and_then(|v| v.as_str()),
        Some("missing_reference")
    );
    assert_eq!(
        error.get("message").and_then(|v| v.as_str()),
        Some("Referenced record does not exist")
    );
}
