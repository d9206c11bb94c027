use crate::db;
use crate::ipc::helpers::{with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::settings::Settings;
use rusqlite::Connection;
use serde_json::json;

fn settings_get(conn: &Connection, _params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let value = serde_json::to_value(&settings).map_err(HandlerErr::db_query)?;
    Ok(json!({ "settings": value }))
}

/// Merges the patch over the stored document at the top level and validates
/// the result as a whole before writing it back. Unknown top-level keys are
/// rejected.
fn settings_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };

    let current = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let mut merged = serde_json::to_value(&current).map_err(HandlerErr::db_query)?;
    let Some(target) = merged.as_object_mut() else {
        return Err(HandlerErr::db_query("settings document is not an object"));
    };
    for (key, value) in patch {
        if !target.contains_key(key) {
            return Err(HandlerErr::bad_params(format!(
                "unknown settings key {:?}",
                key
            )));
        }
        target.insert(key.clone(), value.clone());
    }

    let updated: Settings = serde_json::from_value(merged.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid settings: {}", e)))?;
    if updated.seating.rows == 0 || updated.seating.cols == 0 {
        return Err(HandlerErr::bad_params(
            "seating grid dimensions must be positive",
        ));
    }
    db::store_settings(conn, &updated).map_err(HandlerErr::db_update)?;

    Ok(json!({ "settings": merged }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(with_conn(state, req, settings_get)),
        "settings.update" => Some(with_conn(state, req, settings_update)),
        _ => None,
    }
}
