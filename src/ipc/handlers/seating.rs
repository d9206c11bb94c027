use crate::db;
use crate::ipc::helpers::{with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::seating::{self, ArrangeError, Seat};
use rand::Rng;
use rusqlite::Connection;
use serde_json::json;
use std::collections::HashSet;

fn grid_dimensions(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<(usize, usize), HandlerErr> {
    if let (Some(rows), Some(cols)) = (
        params.get("rows").and_then(|v| v.as_u64()),
        params.get("cols").and_then(|v| v.as_u64()),
    ) {
        return Ok((rows as usize, cols as usize));
    }
    if params.get("rows").is_some() || params.get("cols").is_some() {
        return Err(HandlerErr::bad_params(
            "rows and cols must be provided together",
        ));
    }
    // Last persisted chart wins over the settings default.
    if let Some(grid) = db::settings_get_json(conn, "seating.grid").map_err(HandlerErr::db_query)? {
        if let (Some(rows), Some(cols)) = (
            grid.get("rows").and_then(|v| v.as_u64()),
            grid.get("cols").and_then(|v| v.as_u64()),
        ) {
            return Ok((rows as usize, cols as usize));
        }
    }
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    Ok((settings.seating.rows, settings.seating.cols))
}

fn seats_json(seats: &[Seat]) -> Vec<serde_json::Value> {
    seats
        .iter()
        .map(|s| {
            json!({
                "row": s.row,
                "col": s.col,
                "studentId": s.student_id
            })
        })
        .collect()
}

fn arrange_err(e: ArrangeError) -> HandlerErr {
    let message = e.to_string();
    let (code, details) = match &e {
        ArrangeError::CapacityExceeded { students, capacity } => (
            "over_capacity",
            json!({ "students": students, "capacity": capacity }),
        ),
        ArrangeError::DuplicateStudent { id } => ("duplicate_student", json!({ "studentId": id })),
        ArrangeError::InvalidGrid { rows, cols } => {
            ("invalid_grid", json!({ "rows": rows, "cols": cols }))
        }
    };
    HandlerErr {
        code,
        message,
        details: Some(details),
    }
}

fn seating_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (rows, cols) = grid_dimensions(conn, params)?;
    let mut seats = seating::empty_grid(rows, cols);
    for (row, col, student_id) in db::load_seating(conn).map_err(HandlerErr::db_query)? {
        if row >= rows || col >= cols {
            // Persisted under a larger grid; surface only what fits.
            continue;
        }
        seats[row * cols + col].student_id = Some(student_id);
    }
    Ok(json!({
        "rows": rows,
        "cols": cols,
        "seats": seats_json(&seats)
    }))
}

/// Stores a manually edited chart. The full grid does not have to be sent,
/// only seats; empty cells may be omitted or carry a null studentId.
fn seating_save(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (rows, cols) = grid_dimensions(conn, params)?;
    if rows == 0 || cols == 0 {
        return Err(arrange_err(ArrangeError::InvalidGrid { rows, cols }));
    }
    let Some(seats_json_in) = params.get("seats").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing seats"));
    };

    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;
    let known: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();

    let mut seats = Vec::with_capacity(seats_json_in.len());
    let mut taken_cells = HashSet::new();
    let mut taken_students = HashSet::new();
    for raw in seats_json_in {
        let seat: Seat = serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::bad_params(format!("bad seat: {}", e)))?;
        if seat.row >= rows || seat.col >= cols {
            return Err(HandlerErr::bad_params(format!(
                "seat ({}, {}) is outside the {}x{} grid",
                seat.row, seat.col, rows, cols
            )));
        }
        if !taken_cells.insert((seat.row, seat.col)) {
            return Err(HandlerErr::bad_params(format!(
                "seat ({}, {}) appears twice",
                seat.row, seat.col
            )));
        }
        if let Some(id) = seat.student_id.as_deref() {
            if !known.contains(id) {
                return Err(HandlerErr::not_found(format!("unknown student id {:?}", id)));
            }
            if !taken_students.insert(id.to_string()) {
                return Err(HandlerErr::bad_params(format!(
                    "student {:?} is seated twice",
                    id
                )));
            }
        }
        seats.push(seat);
    }

    db::replace_seating(conn, rows, cols, &seats).map_err(HandlerErr::db_update)?;
    Ok(json!({ "ok": true }))
}

/// Snapshots the roster and runs the placement engine. The seed defaults to
/// a fresh random value and is echoed back so a chart can be regenerated.
fn seating_auto_arrange(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let (rows, cols) = grid_dimensions(conn, params)?;
    let seed = match params.get("seed") {
        Some(v) => v
            .as_u64()
            .ok_or_else(|| HandlerErr::bad_params("seed must be an unsigned integer"))?,
        None => rand::thread_rng().gen(),
    };

    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;
    let arrangement = seating::arrange_seeded(&roster, rows, cols, seed).map_err(arrange_err)?;

    db::replace_seating(conn, rows, cols, &arrangement.seats).map_err(HandlerErr::db_update)?;

    let unmet = serde_json::to_value(&arrangement.unmet).map_err(HandlerErr::db_query)?;
    Ok(json!({
        "rows": rows,
        "cols": cols,
        "seed": seed,
        "seats": seats_json(&arrangement.seats),
        "unmetConstraints": unmet
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "seating.get" => Some(with_conn(state, req, seating_get)),
        "seating.save" => Some(with_conn(state, req, seating_save)),
        "seating.autoArrange" => Some(with_conn(state, req, seating_auto_arrange)),
        _ => None,
    }
}
