use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{optional_bool, optional_str, required_f64, required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::{parse_answers, Answer, Submission};
use crate::submissions::{self, NewSubmission, SubmissionUpdate};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;

fn answers_param(params: &serde_json::Value) -> ServiceResult<Vec<Answer>> {
    parse_answers(params.get("answers").unwrap_or(&serde_json::Value::Null))
}

fn submission_json(s: &Submission) -> serde_json::Value {
    let mut v = json!(s);
    v["finalScore"] = json!(s.effective_score());
    v
}

fn submissions_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let input = NewSubmission {
        assessment_id: required_str(params, "assessmentId")?,
        user_id: required_str(params, "userId")?,
        answers: answers_param(params)?,
        is_draft: optional_bool(params, "isDraft")?.unwrap_or(false),
    };
    let submission = submissions::create_submission(conn, input, Utc::now())?;
    Ok(json!({ "submission": submission_json(&submission) }))
}

fn submissions_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let input = SubmissionUpdate {
        submission_id: required_str(params, "submissionId")?,
        user_id: required_str(params, "userId")?,
        account_id: optional_str(params, "accountId"),
        answers: answers_param(params)?,
        is_draft: optional_bool(params, "isDraft")?.unwrap_or(false),
    };
    let submission = submissions::update_submission(conn, input, Utc::now())?;
    Ok(json!({ "submission": submission_json(&submission) }))
}

fn submissions_adjust_score(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let submission_id = required_str(params, "submissionId")?;
    let adjusted = required_f64(params, "adjustedScore")?;
    let submission = submissions::adjust_submission_score(conn, &submission_id, adjusted)?;
    Ok(json!({ "submission": submission_json(&submission) }))
}

fn submissions_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let submission_id = required_str(params, "submissionId")?;
    submissions::delete_submission(conn, &submission_id)?;
    Ok(json!({ "deleted": true }))
}

fn list(
    conn: &Connection,
    assessment_id: &str,
    user_id: Option<&str>,
) -> ServiceResult<serde_json::Value> {
    submissions::load_assessment(conn, assessment_id)?;
    let rows: Vec<serde_json::Value> = db::list_submissions(conn, assessment_id, user_id)?
        .iter()
        .map(submission_json)
        .collect();
    Ok(json!({ "submissions": rows }))
}

fn submissions_list_by_assessment(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    list(conn, &assessment_id, None)
}

fn submissions_list_by_assessment_and_user(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let user_id = required_str(params, "userId")?;
    if db::get_user(conn, &user_id)?.is_none() {
        return Err(ServiceError::not_found("User not found"));
    }
    list(conn, &assessment_id, Some(&user_id))
}

fn submissions_preview(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let assessment = submissions::load_assessment(conn, &assessment_id)?;
    let scored = submissions::preview(&assessment, answers_param(params)?)?;
    Ok(json!({
        "answers": scored.answers,
        "totalScore": scored.total,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.create" => Some(with_db(state, req, submissions_create)),
        "submissions.update" => Some(with_db(state, req, submissions_update)),
        "submissions.adjustScore" => Some(with_db(state, req, submissions_adjust_score)),
        "submissions.delete" => Some(with_db(state, req, submissions_delete)),
        "submissions.listByAssessment" => Some(with_db(state, req, submissions_list_by_assessment)),
        "submissions.listByAssessmentAndUser" => {
            Some(with_db(state, req, submissions_list_by_assessment_and_user))
        }
        "submissions.preview" => Some(with_db(state, req, submissions_preview)),
        _ => None,
    }
}
