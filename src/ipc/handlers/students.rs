use crate::db;
use crate::ipc::helpers::{get_required_str, parse_gender, parse_rank, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn student_exists(conn: &Connection, student_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::db_query)
}

fn students_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;
    let students: Vec<serde_json::Value> = roster
        .iter()
        .enumerate()
        .map(|(i, s)| {
            json!({
                "id": s.id,
                "name": s.name,
                "gender": db::gender_to_str(s.gender),
                "rank": db::rank_to_str(s.rank),
                "isTalkative": s.is_talkative,
                "sortOrder": i as i64
            })
        })
        .collect();
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    if name.trim().is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let gender = parse_gender(&get_required_str(params, "gender")?)?;
    let rank = parse_rank(&get_required_str(params, "rank")?)?;
    let is_talkative = params
        .get("isTalkative")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let next_order: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students",
            [],
            |r| r.get(0),
        )
        .map_err(HandlerErr::db_query)?;

    let student_id = uuid::Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, gender, rank, talkative, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            name.trim(),
            db::gender_to_str(gender),
            db::rank_to_str(rank),
            is_talkative as i64,
            next_order,
            now_stamp(),
        ),
    )
    .map_err(HandlerErr::db_update)?;

    Ok(json!({ "studentId": student_id }))
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };

    let mut sets: Vec<(&str, String)> = Vec::new();
    if let Some(v) = patch.get("name") {
        let Some(name) = v.as_str().filter(|s| !s.trim().is_empty()) else {
            return Err(HandlerErr::bad_params("name must be a non-empty string"));
        };
        sets.push(("name", name.trim().to_string()));
    }
    if let Some(v) = patch.get("gender") {
        let Some(raw) = v.as_str() else {
            return Err(HandlerErr::bad_params("gender must be a string"));
        };
        sets.push(("gender", db::gender_to_str(parse_gender(raw)?).to_string()));
    }
    if let Some(v) = patch.get("rank") {
        let Some(raw) = v.as_str() else {
            return Err(HandlerErr::bad_params("rank must be a string"));
        };
        sets.push(("rank", db::rank_to_str(parse_rank(raw)?).to_string()));
    }
    if let Some(v) = patch.get("isTalkative") {
        let Some(flag) = v.as_bool() else {
            return Err(HandlerErr::bad_params("isTalkative must be a boolean"));
        };
        sets.push(("talkative", if flag { "1" } else { "0" }.to_string()));
    }
    if sets.is_empty() {
        return Err(HandlerErr::bad_params("patch has no recognized fields"));
    }

    for (column, value) in &sets {
        let sql = format!("UPDATE students SET {} = ?, updated_at = ? WHERE id = ?", column);
        conn.execute(&sql, (value, now_stamp(), &student_id))
            .map_err(HandlerErr::db_update)?;
    }

    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !student_exists(conn, &student_id)? {
        return Err(HandlerErr::not_found("student not found"));
    }

    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    tx.execute(
        "DELETE FROM conduct_records WHERE student_id = ?",
        [&student_id],
    )
    .map_err(HandlerErr::db_update)?;
    tx.execute(
        "DELETE FROM seating_assignments WHERE student_id = ?",
        [&student_id],
    )
    .map_err(HandlerErr::db_update)?;
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(HandlerErr::db_update)?;
    tx.commit().map_err(HandlerErr::db_update)?;

    Ok(json!({ "ok": true }))
}

fn students_reorder(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(ids_json) = params.get("orderedIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing orderedIds"));
    };
    let ids: Vec<String> = ids_json
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    if ids.len() != ids_json.len() {
        return Err(HandlerErr::bad_params("orderedIds must be strings"));
    }

    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    for (position, student_id) in ids.iter().enumerate() {
        tx.execute(
            "UPDATE students SET sort_order = ? WHERE id = ?",
            (position as i64, student_id),
        )
        .map_err(HandlerErr::db_update)?;
    }
    tx.commit().map_err(HandlerErr::db_update)?;

    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, |c, p| {
            let _ = p;
            students_list(c)
        })),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        "students.reorder" => Some(with_conn(state, req, students_reorder)),
        _ => None,
    }
}
