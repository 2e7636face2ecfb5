use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::domain::{FeeRecord, FeeStatus, Student};
use crate::ipc::error::HandlerErr;
use crate::ipc::types::{AppState, Principal};

pub fn open_conn(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::invalid_input("select a workspace first"))
}

/// Session gate: yields the authenticated principal by value so handlers can
/// thread it into writes, or fails before any business logic runs.
pub fn require_principal(state: &AppState) -> Result<Principal, HandlerErr> {
    state
        .session
        .clone()
        .ok_or_else(|| HandlerErr::unauthorized("please log in first"))
}

/// Typed param decoding. Unknown and missing fields are rejected here, before
/// any query is issued.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, HandlerErr> {
    serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::invalid_input(format!("bad params: {}", e)))
}

pub fn parse_date(s: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| HandlerErr::invalid_input(format!("date must be YYYY-MM-DD, got {:?}", s)))
}

/// "Today" comes from the server's local clock; dates carry no timezone.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub fn student_from_row(r: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        class_name: r.get(2)?,
        roll_no: r.get(3)?,
    })
}

pub fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "name": s.name,
        "className": s.class_name,
        "rollNo": s.roll_no,
    })
}

/// Roster order everywhere: class ascending, then roll number ascending.
pub fn list_students(conn: &Connection) -> Result<Vec<Student>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, name, class_name, roll_no
         FROM students
         ORDER BY class_name, roll_no",
    )?;
    let students = stmt
        .query_map([], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Student, HandlerErr> {
    conn.query_row(
        "SELECT id, name, class_name, roll_no FROM students WHERE id = ?",
        [student_id],
        student_from_row,
    )
    .optional()?
    .ok_or_else(|| HandlerErr::not_found("student not found"))
}

pub fn fee_from_row(r: &Row) -> rusqlite::Result<FeeRecord> {
    let status_raw: String = r.get(3)?;
    let status = FeeStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            Type::Text,
            format!("unknown fee status {:?}", status_raw).into(),
        )
    })?;
    let payment_date_raw: Option<String> = r.get(4)?;
    let payment_date = payment_date_raw
        .map(|s| {
            NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e))
            })
        })
        .transpose()?;
    let created_at_raw: String = r.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at_raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    Ok(FeeRecord {
        id: r.get(0)?,
        student_id: r.get(1)?,
        amount: r.get(2)?,
        status,
        payment_date,
        recorded_by: r.get(5)?,
        created_at,
    })
}

pub fn fee_json(f: &FeeRecord) -> serde_json::Value {
    json!({
        "id": f.id,
        "studentId": f.student_id,
        "amount": f.amount,
        "status": f.status.as_str(),
        "paymentDate": f.payment_date.map(|d| d.format("%Y-%m-%d").to_string()),
        "recordedBy": f.recorded_by,
        "createdAt": f.created_at.to_rfc3339(),
    })
}
