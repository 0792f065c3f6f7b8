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
    let exe = env!("CARGO_BIN_EXE_crispd");
    let mut child = Command::new(exe)
        .env_remove("CRISPD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn crispd");
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
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
        value.get("error").cloned().unwrap_or_default()
    );
    value.get("result").cloned().unwrap_or_default()
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> (String, String) {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or_default();
    (
        error["code"].as_str().unwrap_or("").to_string(),
        error["message"].as_str().unwrap_or("").to_string(),
    )
}

fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, value))
        .to_string()
}

fn peer_review_answers(students: &[&str], mc: &str, scale: f64, number: f64) -> serde_json::Value {
    json!([
        { "question": "sel", "type": "Team Member Selection Answer", "selectedUserIds": students },
        { "question": "mc", "type": "Multiple Choice Answer", "value": mc },
        { "question": "scale", "type": "Scale Answer", "value": scale },
        { "question": "num", "type": "Number Answer", "value": number },
        { "question": "notes", "type": "Long Response Answer", "value": "Solid sprint." }
    ])
}

fn average_for(results: &serde_json::Value, student: &str) -> f64 {
    results
        .as_array()
        .expect("results array")
        .iter()
        .find(|r| r["student"] == student)
        .and_then(|r| r["averageScore"].as_f64())
        .unwrap_or_else(|| panic!("no result for {}", student))
}

#[test]
fn peer_review_submissions_score_and_aggregate() {
    let workspace = temp_dir("crispd-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let mut ids = Vec::new();
    for (i, name) in ["Marker One", "Marker Two", "Ann", "Ben"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", i),
            "users.create",
            json!({ "name": name }),
        );
        ids.push(str_field(&created, "userId"));
    }
    let (m1, m2, s1, s2) = (
        ids[0].clone(),
        ids[1].clone(),
        ids[2].clone(),
        ids[3].clone(),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "assessments.create",
        json!({
            "title": "Sprint 1 peer review",
            "maxMarks": 50,
            "granularity": "team",
            "startDate": "2020-01-01T00:00:00Z",
            "areSubmissionsEditable": true,
            "questions": [
                { "id": "sel", "type": "Team Member Selection", "text": "Who are you reviewing?" },
                { "id": "mc", "type": "Multiple Choice", "isScored": true,
                  "options": [{ "text": "Good", "points": 6 }, { "text": "Poor", "points": 1 }] },
                { "id": "scale", "type": "Scale", "isScored": true, "scaleMax": 5,
                  "labels": [{ "value": 1, "label": "Never", "points": 0 },
                             { "value": 5, "label": "Always", "points": 4 }] },
                { "id": "num", "type": "Number", "isScored": true, "maxNumber": 30,
                  "scoringMethod": "range",
                  "scoringRanges": [{ "minValue": 0, "maxValue": 10, "points": 50 },
                                    { "minValue": 20, "maxValue": 30, "points": 90 }] },
                { "id": "notes", "type": "Long Response" }
            ]
        }),
    );
    let assessment_id = str_field(&created, "assessmentId");
    assert_eq!(created["questionsTotalMarks"].as_f64(), Some(100.0));

    let fetched = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "assessments.get",
        json!({ "assessmentId": assessment_id }),
    );
    assert_eq!(fetched["scalingFactor"].as_f64(), Some(0.5));
    assert_eq!(
        fetched["assessment"]["questions"].as_array().map(|q| q.len()),
        Some(5)
    );

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "3a",
        "assessments.update",
        json!({ "assessmentId": assessment_id, "patch": { "title": "Sprint 1 review" } }),
    );
    assert_eq!(renamed["assessment"]["title"], "Sprint 1 review");
    assert_eq!(
        renamed["assessment"]["questionsTotalMarks"].as_f64(),
        Some(100.0)
    );
    let all = request_ok(&mut stdin, &mut reader, "3b", "assessments.list", json!({}));
    assert_eq!(all["assessments"].as_array().map(|a| a.len()), Some(1));

    // Good (6) + scale 3 (2) + 15 between ranges (70) = 78, halved.
    let preview = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "submissions.preview",
        json!({
            "assessmentId": assessment_id,
            "answers": peer_review_answers(&[s1.as_str()], "Good", 3.0, 15.0)
        }),
    );
    assert_eq!(preview["totalScore"].as_f64(), Some(39.0));
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "submissions.listByAssessment",
        json!({ "assessmentId": assessment_id }),
    );
    assert_eq!(listed["submissions"], json!([]));

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "submissions.create",
        json!({
            "assessmentId": assessment_id,
            "userId": m1,
            "answers": peer_review_answers(&[s1.as_str(), s2.as_str()], "Good", 3.0, 15.0)
        }),
    )["submission"]
        .clone();
    let first_id = str_field(&first, "id");
    assert_eq!(first["score"].as_f64(), Some(39.0));
    assert_eq!(first["finalScore"].as_f64(), Some(39.0));
    assert_eq!(first["isDraft"], false);
    let answer_scores: Vec<f64> = first["answers"]
        .as_array()
        .expect("answers")
        .iter()
        .map(|a| a["score"].as_f64().unwrap_or(-1.0))
        .collect();
    assert_eq!(answer_scores, vec![0.0, 3.0, 1.0, 35.0, 0.0]);

    // Poor (1) + scale 1 (0) + 5 in the first range (50) = 51, halved.
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "submissions.create",
        json!({
            "assessmentId": assessment_id,
            "userId": m2,
            "answers": peer_review_answers(&[s1.as_str()], "Poor", 1.0, 5.0)
        }),
    )["submission"]
        .clone();
    let second_id = str_field(&second, "id");
    assert_eq!(second["score"].as_f64(), Some(25.5));

    let results = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "results.listByAssessment",
        json!({ "assessmentId": assessment_id }),
    )["results"]
        .clone();
    assert_eq!(average_for(&results, &s1), (39.0 + 25.5) / 2.0);
    assert_eq!(average_for(&results, &s2), 39.0);

    let adjusted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "submissions.adjustScore",
        json!({ "submissionId": first_id, "adjustedScore": 45 }),
    )["submission"]
        .clone();
    assert_eq!(adjusted["score"].as_f64(), Some(39.0));
    assert_eq!(adjusted["finalScore"].as_f64(), Some(45.0));

    let unchanged = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "submissions.update",
        json!({
            "submissionId": first_id,
            "userId": m1,
            "answers": peer_review_answers(&[s1.as_str(), s2.as_str()], "Good", 3.0, 15.0)
        }),
    )["submission"]
        .clone();
    assert_eq!(unchanged["adjustedScore"].as_f64(), Some(45.0));

    // Poor (1) + 2 + 70 = 73, halved.
    let changed = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "submissions.update",
        json!({
            "submissionId": first_id,
            "userId": m1,
            "answers": peer_review_answers(&[s1.as_str(), s2.as_str()], "Poor", 3.0, 15.0)
        }),
    )["submission"]
        .clone();
    assert_eq!(changed["score"].as_f64(), Some(36.5));
    assert!(changed.get("adjustedScore").is_none());
    assert_eq!(changed["finalScore"].as_f64(), Some(36.5));

    let s1_result = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "results.get",
        json!({ "assessmentId": assessment_id, "studentId": s1 }),
    )["result"]
        .clone();
    assert_eq!(s1_result["marks"].as_array().map(|m| m.len()), Some(2));
    assert_eq!(
        s1_result["averageScore"].as_f64(),
        Some((36.5 + 25.5) / 2.0)
    );

    request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "submissions.delete",
        json!({ "submissionId": second_id }),
    );
    let s1_result = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "results.get",
        json!({ "assessmentId": assessment_id, "studentId": s1 }),
    )["result"]
        .clone();
    assert_eq!(s1_result["marks"].as_array().map(|m| m.len()), Some(1));
    assert_eq!(s1_result["averageScore"].as_f64(), Some(36.5));

    let mine = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "submissions.listByAssessmentAndUser",
        json!({ "assessmentId": assessment_id, "userId": m1 }),
    );
    assert_eq!(mine["submissions"].as_array().map(|s| s.len()), Some(1));
    let theirs = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "submissions.listByAssessmentAndUser",
        json!({ "assessmentId": assessment_id, "userId": m2 }),
    );
    assert_eq!(theirs["submissions"], json!([]));

    request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "assessments.delete",
        json!({ "assessmentId": assessment_id }),
    );
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "18",
        "results.listByAssessment",
        json!({ "assessmentId": assessment_id }),
    );
    assert_eq!(code, "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn submission_rules_are_enforced_over_ipc() {
    let workspace = temp_dir("crispd-rules");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let mut ids = Vec::new();
    for (i, name) in ["Owner", "Other", "Professor", "Student"].iter().enumerate() {
        let created = request_ok(
            &mut stdin,
            &mut reader,
            &format!("u{}", i),
            "users.create",
            json!({ "name": name }),
        );
        ids.push(str_field(&created, "userId"));
    }
    let (owner, other, prof, student) = (
        ids[0].clone(),
        ids[1].clone(),
        ids[2].clone(),
        ids[3].clone(),
    );
    let account = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "accounts.create",
        json!({ "userId": prof, "email": "Prof@Example.edu", "role": "Faculty member" }),
    );
    let account_id = str_field(&account, "accountId");
    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "accounts.create",
        json!({ "userId": other, "email": "prof@example.edu" }),
    );
    assert_eq!(code, "bad_request");

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "assessments.create",
        json!({
            "title": "Locked review",
            "granularity": "individual",
            "startDate": "2020-01-01T00:00:00Z",
            "areSubmissionsEditable": false,
            "questions": [
                { "id": "sel", "type": "Team Member Selection" },
                { "id": "mr", "type": "Multiple Response", "isScored": true,
                  "allowPartialMarks": true, "areWrongAnswersPenalized": true,
                  "options": [{ "text": "A", "points": 2 }, { "text": "B", "points": 1 },
                              { "text": "C", "points": -3 }] }
            ]
        }),
    );
    let assessment_id = str_field(&created, "assessmentId");
    let answers = |students: &[&str], values: &[&str]| {
        json!([
            { "question": "sel", "type": "Team Member Selection Answer",
              "selectedUserIds": students },
            { "question": "mr", "type": "Multiple Response Answer", "values": values }
        ])
    };

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "submissions.create",
        json!({
            "assessmentId": assessment_id,
            "userId": owner,
            "answers": answers(&[student.as_str(), other.as_str()], &["A"])
        }),
    );
    assert_eq!(code, "bad_request");
    assert!(message.contains("Only one team member"), "{}", message);

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "submissions.create",
        json!({ "assessmentId": assessment_id, "userId": owner, "answers": answers(&[], &["A"]) }),
    );
    assert_eq!(code, "bad_request");
    assert_eq!(message, "Student(s) must be selected!");

    // A + C with penalties floors at 0.
    let submission = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "submissions.create",
        json!({
            "assessmentId": assessment_id,
            "userId": owner,
            "answers": answers(&[student.as_str()], &["A", "C"])
        }),
    )["submission"]
        .clone();
    assert_eq!(submission["score"].as_f64(), Some(0.0));
    let submission_id = str_field(&submission, "id");

    let (code, _) = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "submissions.create",
        json!({
            "assessmentId": assessment_id,
            "userId": owner,
            "answers": answers(&[student.as_str()], &["A"])
        }),
    );
    assert_eq!(code, "bad_request");

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "9",
        "submissions.update",
        json!({
            "submissionId": submission_id,
            "userId": other,
            "answers": answers(&[student.as_str()], &["A", "B"])
        }),
    );
    assert_eq!(code, "bad_request");
    assert!(message.contains("permission"), "{}", message);

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "10",
        "submissions.update",
        json!({
            "submissionId": submission_id,
            "userId": owner,
            "answers": answers(&[student.as_str()], &["A", "B"])
        }),
    );
    assert_eq!(code, "bad_request");
    assert!(message.contains("not editable"), "{}", message);

    let bypassed = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "submissions.update",
        json!({
            "submissionId": submission_id,
            "userId": prof,
            "accountId": account_id,
            "answers": answers(&[student.as_str()], &["A", "B"])
        }),
    )["submission"]
        .clone();
    assert_eq!(bypassed["score"].as_f64(), Some(3.0));

    let value = request(
        &mut stdin,
        &mut reader,
        "12",
        "submissions.adjustScore",
        json!({ "submissionId": submission_id, "adjustedScore": -2 }),
    );
    assert_eq!(value["error"]["code"], "bad_request");
    assert_eq!(value["error"]["details"]["status"], 400);

    let value = request(
        &mut stdin,
        &mut reader,
        "13",
        "results.get",
        json!({ "assessmentId": assessment_id, "studentId": other }),
    );
    assert_eq!(value["error"]["code"], "not_found");
    assert_eq!(value["error"]["details"]["status"], 404);

    let (code, message) = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "submissions.preview",
        json!({
            "assessmentId": assessment_id,
            "answers": [{ "question": "mr", "type": "Multiple Response Answer", "values": ["Z"] }]
        }),
    );
    assert_eq!(code, "bad_request");
    assert_eq!(message, "Invalid option selected for question mr");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
