use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::AttendanceStatus;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_student, list_students, open_conn, parse_date, parse_params, require_principal,
    student_json, today,
};
use crate::ipc::types::{AppState, Principal, Request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SheetParams {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MarkRecord {
    student_id: String,
    status: AttendanceStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct MarkParams {
    records: Vec<MarkRecord>,
    date: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HistoryParams {
    student_id: String,
}

/// The day sheet: every student on the roster, each with their attendance
/// record for the requested date when one exists.
fn attendance_sheet(conn: &Connection, params: &SheetParams) -> Result<serde_json::Value, HandlerErr> {
    let date = match params.date.as_deref() {
        Some(s) => parse_date(s)?,
        None => today(),
    };
    let date_str = date.format("%Y-%m-%d").to_string();

    let students = list_students(conn)?;
    let mut stmt = conn.prepare(
        "SELECT student_id, status FROM attendance WHERE date = ?",
    )?;
    let marked: Vec<(String, String)> = stmt
        .query_map([&date_str], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    let by_student: std::collections::HashMap<String, String> = marked.into_iter().collect();

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let mut row = student_json(s);
            row["attendance"] = match by_student.get(&s.id) {
                Some(status) => json!({ "status": status, "date": date_str }),
                None => serde_json::Value::Null,
            };
            row
        })
        .collect();

    Ok(json!({ "date": date_str, "students": rows }))
}

/// Batch mark: one upsert row per input record, applied inside a single
/// transaction. Conflict key is (student_id, date); a re-mark overwrites
/// status and marked_by, never duplicates.
fn attendance_mark(
    conn: &Connection,
    params: &MarkParams,
    principal: &Principal,
) -> Result<serde_json::Value, HandlerErr> {
    if params.records.is_empty() {
        return Err(HandlerErr::invalid_input("records must not be empty"));
    }
    let date = parse_date(&params.date)?;
    let date_str = date.format("%Y-%m-%d").to_string();

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO attendance(id, student_id, date, status, marked_by)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(student_id, date) DO UPDATE SET
               status = excluded.status,
               marked_by = excluded.marked_by",
        )?;
        for record in &params.records {
            stmt.execute((
                Uuid::new_v4().to_string(),
                &record.student_id,
                &date_str,
                record.status.as_str(),
                &principal.id,
            ))?;
        }
    }
    tx.commit()?;

    Ok(json!({ "marked": params.records.len() }))
}

/// Per-student history, newest date first, joined with the marking teacher's
/// name.
fn attendance_history(
    conn: &Connection,
    params: &HistoryParams,
) -> Result<serde_json::Value, HandlerErr> {
    let student = get_student(conn, &params.student_id)?;

    let mut stmt = conn.prepare(
        "SELECT a.id, a.date, a.status, a.marked_by, t.name
         FROM attendance a
         JOIN teachers t ON t.id = a.marked_by
         WHERE a.student_id = ?
         ORDER BY a.date DESC",
    )?;
    let records: Vec<serde_json::Value> = stmt
        .query_map([&student.id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "date": r.get::<_, String>(1)?,
                "status": r.get::<_, String>(2)?,
                "markedBy": r.get::<_, String>(3)?,
                "markedByName": r.get::<_, String>(4)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "student": student_json(&student),
        "records": records,
    }))
}

fn handle_sheet(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: SheetParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match attendance_sheet(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let principal = match require_principal(state) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let params: MarkParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match attendance_mark(conn, &params, &principal) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: HistoryParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match attendance_history(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.sheet" => Some(handle_sheet(state, req)),
        "attendance.mark" => Some(handle_mark(state, req)),
        "attendance.history" => Some(handle_history(state, req)),
        _ => None,
    }
}
