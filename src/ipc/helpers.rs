use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::seating::{AcademicRank, Gender};
use rusqlite::Connection;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "not_found",
            message: message.into(),
            details: None,
        }
    }

    pub fn db_query(e: impl std::fmt::Display) -> Self {
        HandlerErr {
            code: "db_query_failed",
            message: e.to_string(),
            details: None,
        }
    }

    pub fn db_update(e: impl std::fmt::Display) -> Self {
        HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: None,
        }
    }
}

/// Runs a handler against the open workspace connection, mapping the result
/// into the wire envelope. Every method except `health` and
/// `workspace.select` goes through here.
pub fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_u64(params: &serde_json::Value, key: &str) -> Result<u64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn parse_gender(raw: &str) -> Result<Gender, HandlerErr> {
    match raw {
        "male" => Ok(Gender::Male),
        "female" => Ok(Gender::Female),
        _ => Err(HandlerErr::bad_params(format!(
            "gender must be male or female, got {:?}",
            raw
        ))),
    }
}

pub fn parse_rank(raw: &str) -> Result<AcademicRank, HandlerErr> {
    match raw {
        "good" => Ok(AcademicRank::Good),
        "fair" => Ok(AcademicRank::Fair),
        "pass" => Ok(AcademicRank::Pass),
        "fail" => Ok(AcademicRank::Fail),
        _ => Err(HandlerErr::bad_params(format!(
            "rank must be one of good, fair, pass, fail, got {:?}",
            raw
        ))),
    }
}
