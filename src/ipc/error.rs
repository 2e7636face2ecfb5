use rusqlite::ffi;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Sub-classification of a persistence failure, derived from the SQLite
/// extended result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorClass {
    DuplicateEntry,
    MissingReference,
    Other,
}

impl StoreErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorClass::DuplicateEntry => "duplicate_entry",
            StoreErrorClass::MissingReference => "missing_reference",
            StoreErrorClass::Other => "other",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            StoreErrorClass::DuplicateEntry => "Duplicate entry found",
            StoreErrorClass::MissingReference => "Referenced record does not exist",
            StoreErrorClass::Other => "Database error occurred",
        }
    }
}

/// Closed error taxonomy for the IPC surface. Every handler failure maps to
/// one of these; unauthorized is emitted only by the session gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Store(StoreErrorClass),
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Store(_) => "store_error",
        }
    }
}

#[derive(Debug)]
pub struct HandlerErr {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn invalid_input(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            kind: ErrorKind::NotFound,
            message: message.into(),
            details: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            kind: ErrorKind::Unauthorized,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        let details = match self.kind {
            ErrorKind::Store(class) => {
                let mut d = self.details.unwrap_or_else(|| json!({}));
                d["classification"] = json!(class.as_str());
                Some(d)
            }
            _ => self.details,
        };
        err(id, self.kind.code(), self.message, details)
    }
}

impl From<rusqlite::Error> for HandlerErr {
    fn from(e: rusqlite::Error) -> HandlerErr {
        let class = classify_sqlite(&e);
        // The raw driver message stays out of the wire response; the
        // classification picks the user-facing string.
        eprintln!("store error ({}): {}", class.as_str(), e);
        HandlerErr {
            kind: ErrorKind::Store(class),
            message: class.user_message().to_string(),
            details: None,
        }
    }
}

fn classify_sqlite(e: &rusqlite::Error) -> StoreErrorClass {
    match e {
        rusqlite::Error::SqliteFailure(f, _) => match f.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                StoreErrorClass::DuplicateEntry
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreErrorClass::MissingReference,
            _ => StoreErrorClass::Other,
        },
        _ => StoreErrorClass::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_and_foreign_key_codes_classify() {
        let dup = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ffi::ErrorCode::ConstraintViolation,
                extended_code: ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some("UNIQUE constraint failed".to_string()),
        );
        let fk = rusqlite::Error::SqliteFailure(
            ffi::Error {
                code: ffi::ErrorCode::ConstraintViolation,
                extended_code: ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            Some("FOREIGN KEY constraint failed".to_string()),
        );
        assert_eq!(classify_sqlite(&dup), StoreErrorClass::DuplicateEntry);
        assert_eq!(classify_sqlite(&fk), StoreErrorClass::MissingReference);
        assert_eq!(
            classify_sqlite(&rusqlite::Error::QueryReturnedNoRows),
            StoreErrorClass::Other
        );
    }

    #[test]
    fn store_response_carries_classification_and_generic_message() {
        let e = HandlerErr {
            kind: ErrorKind::Store(StoreErrorClass::DuplicateEntry),
            message: StoreErrorClass::DuplicateEntry.user_message().to_string(),
            details: None,
        };
        let resp = e.response("42");
        assert_eq!(resp["ok"], false);
        assert_eq!(resp["error"]["code"], "store_error");
        assert_eq!(resp["error"]["message"], "Duplicate entry found");
        assert_eq!(resp["error"]["details"]["classification"], "duplicate_entry");
    }
}
