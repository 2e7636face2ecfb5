use std::collections::HashMap;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{latest_fee_for, payment_date_for, FeeRecord, FeeStatus};
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    fee_from_row, fee_json, get_student, list_students, open_conn, parse_date, parse_params,
    require_principal, student_json, today,
};
use crate::ipc::types::{AppState, Principal, Request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RecordFeeParams {
    student_id: String,
    amount: serde_json::Value,
    status: FeeStatus,
    #[serde(default)]
    payment_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateFeeStatusParams {
    fee_id: String,
    status: FeeStatus,
    #[serde(default)]
    payment_date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct FeeHistoryParams {
    student_id: String,
}

/// Amounts arrive as a JSON number or a decimal string from a form field.
/// Anything non-numeric fails cleanly; NaN never reaches the store.
fn parse_amount(raw: &serde_json::Value) -> Result<f64, HandlerErr> {
    let amount = match raw {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match amount {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(HandlerErr::invalid_input("amount must be a positive number")),
    }
}

fn fees_record(
    conn: &Connection,
    params: &RecordFeeParams,
    principal: &Principal,
) -> Result<serde_json::Value, HandlerErr> {
    if params.student_id.trim().is_empty() {
        return Err(HandlerErr::invalid_input("missing required fields"));
    }
    let amount = parse_amount(&params.amount)?;
    let supplied = params.payment_date.as_deref().map(parse_date).transpose()?;
    let payment_date = payment_date_for(params.status, supplied, today());

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO fees(id, student_id, amount, status, payment_date, recorded_by, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            params.student_id.trim(),
            amount,
            params.status.as_str(),
            payment_date.map(|d| d.format("%Y-%m-%d").to_string()),
            &principal.id,
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(json!({ "feeId": id }))
}

fn fees_update_status(
    conn: &Connection,
    params: &UpdateFeeStatusParams,
) -> Result<serde_json::Value, HandlerErr> {
    let exists = conn
        .query_row("SELECT 1 FROM fees WHERE id = ?", [&params.fee_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    if !exists {
        return Err(HandlerErr::not_found("fee record not found"));
    }

    let supplied = params.payment_date.as_deref().map(parse_date).transpose()?;
    let payment_date = payment_date_for(params.status, supplied, today());

    conn.execute(
        "UPDATE fees SET status = ?, payment_date = ? WHERE id = ?",
        (
            params.status.as_str(),
            payment_date.map(|d| d.format("%Y-%m-%d").to_string()),
            &params.fee_id,
        ),
    )?;
    Ok(json!({ "updated": true }))
}

fn fees_history(conn: &Connection, params: &FeeHistoryParams) -> Result<serde_json::Value, HandlerErr> {
    let student = get_student(conn, &params.student_id)?;

    let mut stmt = conn.prepare(
        "SELECT f.id, f.student_id, f.amount, f.status, f.payment_date, f.recorded_by,
                f.created_at, t.name
         FROM fees f
         JOIN teachers t ON t.id = f.recorded_by
         WHERE f.student_id = ?
         ORDER BY f.created_at DESC",
    )?;
    let records: Vec<serde_json::Value> = stmt
        .query_map([&student.id], |r| {
            let fee = fee_from_row(r)?;
            let recorded_by_name: String = r.get(7)?;
            let mut row = fee_json(&fee);
            row["recordedByName"] = json!(recorded_by_name);
            Ok(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "student": student_json(&student),
        "records": records,
    }))
}

/// Every student with their latest fee (or null), roster order.
fn fees_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let students = list_students(conn)?;

    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount, status, payment_date, recorded_by, created_at
         FROM fees",
    )?;
    let fees: Vec<FeeRecord> = stmt
        .query_map([], fee_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut by_student: HashMap<String, Vec<FeeRecord>> = HashMap::new();
    for fee in fees {
        by_student.entry(fee.student_id.clone()).or_default().push(fee);
    }

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let latest = by_student.get(&s.id).and_then(|group| latest_fee_for(group));
            let mut row = student_json(s);
            row["latestFee"] = match latest {
                Some(fee) => fee_json(fee),
                None => serde_json::Value::Null,
            };
            row
        })
        .collect();

    Ok(json!({ "students": rows }))
}

fn handle_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let principal = match require_principal(state) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let params: RecordFeeParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match fees_record(conn, &params, &principal) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_update_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: UpdateFeeStatusParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match fees_update_status(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_history(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: FeeHistoryParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match fees_history(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match fees_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "fees.list" => Some(handle_list(state, req)),
        "fees.record" => Some(handle_record(state, req)),
        "fees.updateStatus" => Some(handle_update_status(state, req)),
        "fees.history" => Some(handle_history(state, req)),
        _ => None,
    }
}
