use rusqlite::types::Type;
use rusqlite::Connection;
use serde_json::json;

use crate::domain::{compute_dashboard_stats, AttendanceStatus, FeeRecord, Student};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{fee_from_row, list_students, open_conn, require_principal, today};
use crate::ipc::types::{AppState, Request};

fn todays_statuses(conn: &Connection) -> Result<Vec<AttendanceStatus>, HandlerErr> {
    let date_str = today().format("%Y-%m-%d").to_string();
    let mut stmt = conn.prepare("SELECT status FROM attendance WHERE date = ?")?;
    let statuses = stmt
        .query_map([&date_str], |r| {
            let raw: String = r.get(0)?;
            AttendanceStatus::parse(&raw).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    Type::Text,
                    format!("unknown attendance status {:?}", raw).into(),
                )
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(statuses)
}

fn fees_with_status(conn: &Connection, status: &str) -> Result<Vec<FeeRecord>, HandlerErr> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount, status, payment_date, recorded_by, created_at
         FROM fees
         WHERE status = ?",
    )?;
    let fees = stmt
        .query_map([status], fee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(fees)
}

fn fetch<T>(label: &str, result: Result<T, HandlerErr>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            eprintln!("dashboard fetch {} failed: {}", label, e.message);
            None
        }
    }
}

/// Four independent reads feed the aggregator. A failed read never produces a
/// half-correct dashboard: the stats degrade to all zeros and the response is
/// flagged degraded instead of erroring out.
fn dashboard_open(conn: &Connection) -> serde_json::Value {
    let students: Option<Vec<Student>> = fetch("students", list_students(conn));
    let attendance = fetch("attendance", todays_statuses(conn));
    let pending = fetch("pending fees", fees_with_status(conn, "Pending"));
    let paid = fetch("paid fees", fees_with_status(conn, "Paid"));

    let degraded =
        students.is_none() || attendance.is_none() || pending.is_none() || paid.is_none();
    let stats = compute_dashboard_stats(
        students.as_deref(),
        attendance.as_deref(),
        pending.as_deref(),
        paid.as_deref(),
    );

    json!({ "stats": stats, "degraded": degraded })
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    ok(&req.id, dashboard_open(conn))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.open" => Some(handle_open(state, req)),
        _ => None,
    }
}
