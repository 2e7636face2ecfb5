use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{
    get_student, list_students, open_conn, parse_params, require_principal, student_json,
};
use crate::ipc::types::{AppState, Request};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AddStudentParams {
    name: String,
    class: String,
    roll_no: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UpdateStudentParams {
    student_id: String,
    #[serde(default)]
    class: Option<String>,
    #[serde(default)]
    roll_no: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DeleteStudentParams {
    student_id: String,
}

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let students = list_students(conn)?;
    let rows: Vec<serde_json::Value> = students.iter().map(student_json).collect();
    Ok(json!({ "students": rows }))
}

fn students_add(conn: &Connection, params: &AddStudentParams) -> Result<serde_json::Value, HandlerErr> {
    if params.name.trim().is_empty() || params.class.trim().is_empty() {
        return Err(HandlerErr::invalid_input("all fields are required"));
    }
    if params.roll_no < 1 {
        return Err(HandlerErr::invalid_input("roll number must be positive"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, class_name, roll_no) VALUES(?, ?, ?, ?)",
        (&id, params.name.trim(), params.class.trim(), params.roll_no),
    )?;
    Ok(json!({ "studentId": id }))
}

fn students_update(
    conn: &Connection,
    params: &UpdateStudentParams,
) -> Result<serde_json::Value, HandlerErr> {
    // Admin edits are limited to the class/roll fields.
    let current = get_student(conn, &params.student_id)?;
    let class_name = params
        .class
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.class_name);
    let roll_no = params.roll_no.unwrap_or(current.roll_no);
    if class_name.is_empty() {
        return Err(HandlerErr::invalid_input("class must not be empty"));
    }
    if roll_no < 1 {
        return Err(HandlerErr::invalid_input("roll number must be positive"));
    }
    conn.execute(
        "UPDATE students SET class_name = ?, roll_no = ? WHERE id = ?",
        (class_name, roll_no, &params.student_id),
    )?;
    Ok(json!({ "updated": true }))
}

fn students_delete(
    conn: &Connection,
    params: &DeleteStudentParams,
) -> Result<serde_json::Value, HandlerErr> {
    let student = get_student(conn, &params.student_id)?;
    conn.execute("DELETE FROM students WHERE id = ?", [&student.id])?;
    Ok(json!({ "deleted": true }))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match students_list(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: AddStudentParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match students_add(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: UpdateStudentParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match students_update(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    let params: DeleteStudentParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    match students_delete(conn, &params) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.add" => Some(handle_add(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
