use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::seating::{AcademicRank, Gender, Seat, Student};
use crate::settings::Settings;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("classroom.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            rank TEXT NOT NULL,
            talkative INTEGER NOT NULL,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_sort ON students(sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS conduct_records(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            week INTEGER NOT NULL,
            score INTEGER NOT NULL,
            violations TEXT NOT NULL,
            positives TEXT NOT NULL,
            note TEXT,
            updated_at TEXT,
            UNIQUE(student_id, week),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_conduct_records_week ON conduct_records(week)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_conduct_records_student ON conduct_records(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seating_assignments(
            seat_row INTEGER NOT NULL,
            seat_col INTEGER NOT NULL,
            student_id TEXT NOT NULL,
            PRIMARY KEY(seat_row, seat_col),
            UNIQUE(student_id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS app_settings(
            key TEXT PRIMARY KEY,
            json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO app_settings(key, json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET json = excluded.json",
        (key, value.to_string()),
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT json FROM app_settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(match raw {
        Some(s) => Some(serde_json::from_str(&s)?),
        None => None,
    })
}

pub fn load_settings(conn: &Connection) -> anyhow::Result<Settings> {
    match settings_get_json(conn, "settings")? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Settings::default()),
    }
}

pub fn store_settings(conn: &Connection, settings: &Settings) -> anyhow::Result<()> {
    settings_set_json(conn, "settings", &serde_json::to_value(settings)?)
}

fn gender_from_str(raw: &str) -> Option<Gender> {
    match raw {
        "male" => Some(Gender::Male),
        "female" => Some(Gender::Female),
        _ => None,
    }
}

fn rank_from_str(raw: &str) -> Option<AcademicRank> {
    match raw {
        "good" => Some(AcademicRank::Good),
        "fair" => Some(AcademicRank::Fair),
        "pass" => Some(AcademicRank::Pass),
        "fail" => Some(AcademicRank::Fail),
        _ => None,
    }
}

pub fn gender_to_str(gender: Gender) -> &'static str {
    match gender {
        Gender::Male => "male",
        Gender::Female => "female",
    }
}

pub fn rank_to_str(rank: AcademicRank) -> &'static str {
    match rank {
        AcademicRank::Good => "good",
        AcademicRank::Fair => "fair",
        AcademicRank::Pass => "pass",
        AcademicRank::Fail => "fail",
    }
}

/// Roster snapshot in display order; the seating engine consumes this as-is.
pub fn load_roster(conn: &Connection) -> anyhow::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, gender, rank, talkative
         FROM students
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, i64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut roster = Vec::with_capacity(rows.len());
    for (id, name, gender_raw, rank_raw, talkative) in rows {
        let gender = gender_from_str(&gender_raw)
            .ok_or_else(|| anyhow::anyhow!("student {}: bad gender {:?}", id, gender_raw))?;
        let rank = rank_from_str(&rank_raw)
            .ok_or_else(|| anyhow::anyhow!("student {}: bad rank {:?}", id, rank_raw))?;
        roster.push(Student {
            id,
            name,
            gender,
            rank,
            is_talkative: talkative != 0,
        });
    }
    Ok(roster)
}

/// Replaces the persisted chart in one transaction. Only occupied seats are
/// stored; the grid dimensions travel separately under the `seating.grid`
/// settings key.
pub fn replace_seating(
    conn: &Connection,
    rows: usize,
    cols: usize,
    seats: &[Seat],
) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM seating_assignments", [])?;
    for seat in seats {
        let Some(student_id) = seat.student_id.as_deref() else {
            continue;
        };
        tx.execute(
            "INSERT INTO seating_assignments(seat_row, seat_col, student_id) VALUES(?, ?, ?)",
            (seat.row as i64, seat.col as i64, student_id),
        )?;
    }
    tx.commit()?;
    settings_set_json(
        conn,
        "seating.grid",
        &serde_json::json!({ "rows": rows, "cols": cols }),
    )?;
    Ok(())
}

pub fn load_seating(conn: &Connection) -> anyhow::Result<Vec<(usize, usize, String)>> {
    let mut stmt = conn.prepare(
        "SELECT seat_row, seat_col, student_id FROM seating_assignments
         ORDER BY seat_row, seat_col",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, i64>(0)? as usize,
                r.get::<_, i64>(1)? as usize,
                r.get::<_, String>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
