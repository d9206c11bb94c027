use crate::conduct;
use crate::db;
use crate::ipc::helpers::{
    get_required_i64, get_required_str, get_required_u64, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

struct RecordData {
    score: i64,
    violations: Vec<String>,
    positives: Vec<String>,
    note: String,
}

fn parse_labels(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn require_week(params: &serde_json::Value) -> Result<i64, HandlerErr> {
    let week = get_required_u64(params, "week")? as i64;
    if week < 1 {
        return Err(HandlerErr::bad_params("week must be >= 1"));
    }
    Ok(week)
}

fn require_student(conn: &Connection, student_id: &str) -> Result<(), HandlerErr> {
    let exists = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(HandlerErr::db_query)?
        .is_some();
    if exists {
        Ok(())
    } else {
        Err(HandlerErr::not_found("student not found"))
    }
}

fn load_record(
    conn: &Connection,
    student_id: &str,
    week: i64,
) -> Result<Option<RecordData>, HandlerErr> {
    conn.query_row(
        "SELECT score, violations, positives, note
         FROM conduct_records
         WHERE student_id = ? AND week = ?",
        (student_id, week),
        |r| {
            Ok(RecordData {
                score: r.get(0)?,
                violations: parse_labels(&r.get::<_, String>(1)?),
                positives: parse_labels(&r.get::<_, String>(2)?),
                note: r.get::<_, Option<String>>(3)?.unwrap_or_default(),
            })
        },
    )
    .optional()
    .map_err(HandlerErr::db_query)
}

fn upsert_record(
    conn: &Connection,
    student_id: &str,
    week: i64,
    data: &RecordData,
) -> Result<(), HandlerErr> {
    let violations = serde_json::to_string(&data.violations).unwrap_or_else(|_| "[]".to_string());
    let positives = serde_json::to_string(&data.positives).unwrap_or_else(|_| "[]".to_string());
    conn.execute(
        "INSERT INTO conduct_records(id, student_id, week, score, violations, positives, note, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, week) DO UPDATE SET
           score = excluded.score,
           violations = excluded.violations,
           positives = excluded.positives,
           note = excluded.note,
           updated_at = excluded.updated_at",
        (
            uuid::Uuid::new_v4().to_string(),
            student_id,
            week,
            data.score,
            violations,
            positives,
            &data.note,
            chrono::Utc::now().to_rfc3339(),
        ),
    )
    .map_err(HandlerErr::db_update)?;
    Ok(())
}

fn week_open(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let week = require_week(params)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;

    let mut rows = Vec::with_capacity(roster.len());
    for student in &roster {
        let record = load_record(conn, &student.id, week)?;
        let has_record = record.is_some();
        let data = record.unwrap_or(RecordData {
            score: settings.default_score,
            violations: Vec::new(),
            positives: Vec::new(),
            note: String::new(),
        });
        let rank = if has_record {
            Some(db::rank_to_str(conduct::rank_from_score(data.score, &settings)))
        } else {
            None
        };
        rows.push(json!({
            "studentId": student.id,
            "name": student.name,
            "score": data.score,
            "violations": data.violations,
            "positives": data.positives,
            "note": data.note,
            "hasRecord": has_record,
            "rank": rank
        }));
    }

    Ok(json!({
        "week": week,
        "defaultScore": settings.default_score,
        "rows": rows
    }))
}

fn set_score(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let week = require_week(params)?;
    let score = get_required_i64(params, "score")?;
    if !(conduct::MIN_SCORE..=conduct::MAX_SCORE).contains(&score) {
        return Err(HandlerErr::bad_params("score must be between 0 and 100"));
    }
    require_student(conn, &student_id)?;

    let mut data = load_record(conn, &student_id, week)?.unwrap_or(RecordData {
        score,
        violations: Vec::new(),
        positives: Vec::new(),
        note: String::new(),
    });
    data.score = score;
    upsert_record(conn, &student_id, week, &data)?;
    Ok(json!({ "ok": true }))
}

fn set_note(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let week = require_week(params)?;
    let note = get_required_str(params, "note")?;
    require_student(conn, &student_id)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;

    let mut data = load_record(conn, &student_id, week)?.unwrap_or(RecordData {
        score: settings.default_score,
        violations: Vec::new(),
        positives: Vec::new(),
        note: String::new(),
    });
    data.note = note;
    upsert_record(conn, &student_id, week, &data)?;
    Ok(json!({ "ok": true }))
}

/// Tags a behavior on a student's week and moves the score by the behavior's
/// points (negative for violations). Removing a tag reverses its points; the
/// score is clamped to 0-100 either way.
fn apply_behavior(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let week = require_week(params)?;
    let behavior_id = get_required_str(params, "behaviorId")?;
    let remove = params
        .get("remove")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    require_student(conn, &student_id)?;

    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let Some(behavior) = settings.find_behavior(&behavior_id) else {
        return Err(HandlerErr::not_found(format!(
            "unknown behavior id {:?}",
            behavior_id
        )));
    };
    let is_violation = settings
        .behavior_config
        .violations
        .iter()
        .any(|b| b.id == behavior.id);

    let mut data = load_record(conn, &student_id, week)?.unwrap_or(RecordData {
        score: settings.default_score,
        violations: Vec::new(),
        positives: Vec::new(),
        note: String::new(),
    });
    let labels = if is_violation {
        &mut data.violations
    } else {
        &mut data.positives
    };

    if remove {
        let Some(pos) = labels.iter().position(|l| l == &behavior.label) else {
            return Err(HandlerErr::not_found("behavior not tagged for this week"));
        };
        labels.remove(pos);
        data.score = conduct::clamp_score(data.score - behavior.points);
    } else {
        labels.push(behavior.label.clone());
        data.score = conduct::clamp_score(data.score + behavior.points);
    }

    upsert_record(conn, &student_id, week, &data)?;
    Ok(json!({ "ok": true, "score": data.score }))
}

fn fill_defaults(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let week = require_week(params)?;
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;

    let tx = conn.unchecked_transaction().map_err(HandlerErr::db_update)?;
    let mut created = 0;
    for student in &roster {
        let exists = tx
            .query_row(
                "SELECT 1 FROM conduct_records WHERE student_id = ? AND week = ?",
                (&student.id, week),
                |r| r.get::<_, i64>(0),
            )
            .optional()
            .map_err(HandlerErr::db_query)?
            .is_some();
        if exists {
            continue;
        }
        tx.execute(
            "INSERT INTO conduct_records(id, student_id, week, score, violations, positives, note, updated_at)
             VALUES(?, ?, ?, ?, '[]', '[]', '', ?)",
            (
                uuid::Uuid::new_v4().to_string(),
                &student.id,
                week,
                settings.default_score,
                chrono::Utc::now().to_rfc3339(),
            ),
        )
        .map_err(HandlerErr::db_update)?;
        created += 1;
    }
    tx.commit().map_err(HandlerErr::db_update)?;

    Ok(json!({ "created": created }))
}

fn semester_summary(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let start_week = get_required_u64(params, "startWeek")? as i64;
    let end_week = get_required_u64(params, "endWeek")? as i64;
    if start_week < 1 || end_week < start_week {
        return Err(HandlerErr::bad_params("week range is invalid"));
    }
    let settings = db::load_settings(conn).map_err(HandlerErr::db_query)?;
    let roster = db::load_roster(conn).map_err(HandlerErr::db_query)?;

    let mut stmt = conn
        .prepare(
            "SELECT score FROM conduct_records
             WHERE student_id = ? AND week >= ? AND week <= ?
             ORDER BY week",
        )
        .map_err(HandlerErr::db_query)?;

    let mut rows = Vec::with_capacity(roster.len());
    let mut distribution = [0i64; 4];
    for student in &roster {
        let scores: Vec<i64> = stmt
            .query_map((&student.id, start_week, end_week), |r| r.get(0))
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
            .map_err(HandlerErr::db_query)?;
        let summary = conduct::semester_summary(&scores, &settings);
        if let Some(rank) = summary.rank {
            use crate::seating::AcademicRank;
            let slot = match rank {
                AcademicRank::Good => 0,
                AcademicRank::Fair => 1,
                AcademicRank::Pass => 2,
                AcademicRank::Fail => 3,
            };
            distribution[slot] += 1;
        }
        rows.push(json!({
            "studentId": student.id,
            "name": student.name,
            "weeksRecorded": scores.len(),
            "avgRaw": summary.avg_raw,
            "avgConverted": summary.avg_converted,
            "rank": summary.rank.map(db::rank_to_str)
        }));
    }

    Ok(json!({
        "startWeek": start_week,
        "endWeek": end_week,
        "rows": rows,
        "distribution": {
            "good": distribution[0],
            "fair": distribution[1],
            "pass": distribution[2],
            "fail": distribution[3]
        }
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "conduct.weekOpen" => Some(with_conn(state, req, week_open)),
        "conduct.setScore" => Some(with_conn(state, req, set_score)),
        "conduct.setNote" => Some(with_conn(state, req, set_note)),
        "conduct.applyBehavior" => Some(with_conn(state, req, apply_behavior)),
        "conduct.fillDefaults" => Some(with_conn(state, req, fill_defaults)),
        "conduct.semesterSummary" => Some(with_conn(state, req, semester_summary)),
        _ => None,
    }
}
