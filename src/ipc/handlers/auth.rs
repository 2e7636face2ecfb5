use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::helpers::{open_conn, parse_params, require_principal};
use crate::ipc::types::{AppState, Principal, Request};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LoginParams {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateTeacherParams {
    name: String,
    email: String,
    password: String,
}

pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn login(conn: &Connection, params: &LoginParams) -> Result<Principal, HandlerErr> {
    if params.email.trim().is_empty() || params.password.is_empty() {
        return Err(HandlerErr::invalid_input("please provide email and password"));
    }

    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT id, name, email, password_hash FROM teachers WHERE email = ?",
            [params.email.trim()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;

    // One message for both unknown email and wrong password.
    let Some((id, name, email, password_hash)) = row else {
        return Err(HandlerErr::invalid_input("invalid email or password"));
    };
    if hash_password(&params.password) != password_hash {
        return Err(HandlerErr::invalid_input("invalid email or password"));
    }

    Ok(Principal { id, name, email })
}

fn create_teacher(conn: &Connection, params: &CreateTeacherParams) -> Result<String, HandlerErr> {
    if params.name.trim().is_empty()
        || params.email.trim().is_empty()
        || params.password.is_empty()
    {
        return Err(HandlerErr::invalid_input("name, email and password are required"));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO teachers(id, name, email, password_hash) VALUES(?, ?, ?, ?)",
        (
            &id,
            params.name.trim(),
            params.email.trim(),
            &hash_password(&params.password),
        ),
    )?;
    Ok(id)
}

fn teachers_exist(conn: &Connection) -> Result<bool, HandlerErr> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM teachers", [], |r| r.get(0))?;
    Ok(count > 0)
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: LoginParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    // Guest-only surface.
    if state.session.is_some() {
        return HandlerErr::invalid_input("already logged in").response(&req.id);
    }
    let principal = {
        let conn = match open_conn(state) {
            Ok(c) => c,
            Err(e) => return e.response(&req.id),
        };
        match login(conn, &params) {
            Ok(p) => p,
            Err(e) => return e.response(&req.id),
        }
    };
    let teacher = json!({
        "id": principal.id,
        "name": principal.name,
        "email": principal.email,
    });
    state.session = Some(principal);
    ok(&req.id, json!({ "teacher": teacher }))
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(e) = require_principal(state) {
        return e.response(&req.id);
    }
    state.session = None;
    ok(&req.id, json!({ "loggedOut": true }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    let teacher = state.session.as_ref().map(|p| {
        json!({
            "id": p.id,
            "name": p.name,
            "email": p.email,
        })
    });
    ok(&req.id, json!({ "teacher": teacher }))
}

fn handle_create_teacher(state: &mut AppState, req: &Request) -> serde_json::Value {
    let params: CreateTeacherParams = match parse_params(&req.params) {
        Ok(p) => p,
        Err(e) => return e.response(&req.id),
    };
    let conn = match open_conn(state) {
        Ok(c) => c,
        Err(e) => return e.response(&req.id),
    };
    // First-run bootstrap: an empty teachers table may be seeded without a
    // session; after that only an authenticated teacher can add colleagues.
    match teachers_exist(conn) {
        Ok(true) => {
            if let Err(e) = require_principal(state) {
                return e.response(&req.id);
            }
        }
        Ok(false) => {}
        Err(e) => return e.response(&req.id),
    }
    match create_teacher(conn, &params) {
        Ok(id) => ok(&req.id, json!({ "teacherId": id })),
        Err(e) => e.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        "teachers.create" => Some(handle_create_teacher(state, req)),
        _ => None,
    }
}
