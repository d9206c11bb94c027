use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classroomd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classroomd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
) -> String {
    let result = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({ "name": name, "gender": "male", "rank": "pass", "isTalkative": false }),
    );
    result
        .get("studentId")
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string()
}

fn week_row<'a>(week: &'a serde_json::Value, student_id: &str) -> &'a serde_json::Value {
    week.get("rows")
        .and_then(|v| v.as_array())
        .expect("rows")
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some(student_id))
        .expect("row for student")
}

#[test]
fn behavior_tags_adjust_and_reverse_the_weekly_score() {
    let workspace = temp_dir("classroomd-conduct-tags");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = create_student(&mut stdin, &mut reader, "c1", "An");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "conduct.setScore",
        json!({ "studentId": student, "week": 1, "score": 85 }),
    );

    // v2 "Homework not done" carries -5.
    let tagged = request_ok(
        &mut stdin,
        &mut reader,
        "b1",
        "conduct.applyBehavior",
        json!({ "studentId": student, "week": 1, "behaviorId": "v2" }),
    );
    assert_eq!(tagged.get("score").and_then(|v| v.as_i64()), Some(80));

    let week = request_ok(
        &mut stdin,
        &mut reader,
        "w1",
        "conduct.weekOpen",
        json!({ "week": 1 }),
    );
    let row = week_row(&week, &student);
    assert_eq!(row.get("score").and_then(|v| v.as_i64()), Some(80));
    assert_eq!(row.get("rank").and_then(|v| v.as_str()), Some("good"));
    let violations = row
        .get("violations")
        .and_then(|v| v.as_array())
        .expect("violations");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].as_str(), Some("Homework not done"));

    // Removing the tag gives the points back.
    let removed = request_ok(
        &mut stdin,
        &mut reader,
        "b2",
        "conduct.applyBehavior",
        json!({ "studentId": student, "week": 1, "behaviorId": "v2", "remove": true }),
    );
    assert_eq!(removed.get("score").and_then(|v| v.as_i64()), Some(85));

    // Heavy violations clamp at zero rather than going negative.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "s2",
        "conduct.setScore",
        json!({ "studentId": student, "week": 2, "score": 10 }),
    );
    let clamped = request_ok(
        &mut stdin,
        &mut reader,
        "b3",
        "conduct.applyBehavior",
        json!({ "studentId": student, "week": 2, "behaviorId": "v7" }),
    );
    assert_eq!(clamped.get("score").and_then(|v| v.as_i64()), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn fill_defaults_only_touches_students_without_records() {
    let workspace = temp_dir("classroomd-conduct-fill");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let scored = create_student(&mut stdin, &mut reader, "c1", "An");
    let unscored = create_student(&mut stdin, &mut reader, "c2", "Binh");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "conduct.setScore",
        json!({ "studentId": scored, "week": 3, "score": 60 }),
    );
    let filled = request_ok(
        &mut stdin,
        &mut reader,
        "f1",
        "conduct.fillDefaults",
        json!({ "week": 3 }),
    );
    assert_eq!(filled.get("created").and_then(|v| v.as_i64()), Some(1));

    let week = request_ok(
        &mut stdin,
        &mut reader,
        "w1",
        "conduct.weekOpen",
        json!({ "week": 3 }),
    );
    assert_eq!(
        week_row(&week, &scored).get("score").and_then(|v| v.as_i64()),
        Some(60)
    );
    assert_eq!(
        week_row(&week, &unscored)
            .get("score")
            .and_then(|v| v.as_i64()),
        Some(100)
    );
    assert_eq!(
        week_row(&week, &unscored)
            .get("hasRecord")
            .and_then(|v| v.as_bool()),
        Some(true)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn semester_summary_follows_configured_thresholds() {
    let workspace = temp_dir("classroomd-conduct-semester");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = create_student(&mut stdin, &mut reader, "c1", "An");

    // 85 -> good (10 pts), 70 -> fair (8 pts), 40 -> fail (4 pts).
    for (week, score) in [(1, 85), (2, 70), (3, 40)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", week),
            "conduct.setScore",
            json!({ "studentId": student, "week": week, "score": score }),
        );
    }

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "sem1",
        "conduct.semesterSummary",
        json!({ "startWeek": 1, "endWeek": 4 }),
    );
    let row = summary
        .get("rows")
        .and_then(|v| v.as_array())
        .expect("rows")
        .iter()
        .find(|r| r.get("studentId").and_then(|v| v.as_str()) == Some(student.as_str()))
        .expect("student row")
        .clone();
    assert_eq!(row.get("weeksRecorded").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(row.get("avgRaw").and_then(|v| v.as_i64()), Some(65));
    assert_eq!(row.get("avgConverted").and_then(|v| v.as_f64()), Some(7.33));
    assert_eq!(row.get("rank").and_then(|v| v.as_str()), Some("fair"));
    assert_eq!(
        summary
            .get("distribution")
            .and_then(|d| d.get("fair"))
            .and_then(|v| v.as_i64()),
        Some(1)
    );

    // Tightening the semester thresholds demotes the same record.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "set1",
        "settings.update",
        json!({ "patch": { "semesterThresholds": { "good": 9.5, "fair": 8.0, "pass": 5.0 } } }),
    );
    let summary2 = request_ok(
        &mut stdin,
        &mut reader,
        "sem2",
        "conduct.semesterSummary",
        json!({ "startWeek": 1, "endWeek": 4 }),
    );
    let row2 = summary2
        .get("rows")
        .and_then(|v| v.as_array())
        .expect("rows")
        .first()
        .expect("student row")
        .clone();
    assert_eq!(row2.get("rank").and_then(|v| v.as_str()), Some("pass"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
