use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, Granularity, Question};
use crate::scoring;
use crate::submissions::load_assessment;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tracing::info;
use uuid::Uuid;

const UPDATABLE_FIELDS: &[&str] = &[
    "title",
    "maxMarks",
    "questionsTotalMarks",
    "granularity",
    "startDate",
    "endDate",
    "areSubmissionsEditable",
    "questions",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssessmentInput {
    title: String,
    #[serde(default)]
    max_marks: f64,
    #[serde(default)]
    questions_total_marks: Option<f64>,
    granularity: Granularity,
    start_date: DateTime<Utc>,
    #[serde(default)]
    end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    are_submissions_editable: bool,
    #[serde(default)]
    questions: Vec<Question>,
}

/// Give new questions an id and reject duplicates.
fn prepare_questions(questions: &mut [Question]) -> ServiceResult<()> {
    let mut seen = HashSet::new();
    for q in questions.iter_mut() {
        if q.id.trim().is_empty() {
            q.id = Uuid::new_v4().to_string();
        }
        if !seen.insert(q.id.clone()) {
            return Err(ServiceError::bad_request(format!(
                "duplicate question id {}",
                q.id
            )));
        }
    }
    Ok(())
}

fn check_assessment(a: &Assessment) -> ServiceResult<()> {
    if a.title.trim().is_empty() {
        return Err(ServiceError::bad_request("title must not be empty"));
    }
    if a.max_marks < 0.0 {
        return Err(ServiceError::bad_request("maxMarks must be >= 0"));
    }
    if let Some(end) = a.end_date {
        if end < a.start_date {
            return Err(ServiceError::bad_request("endDate must not precede startDate"));
        }
    }
    Ok(())
}

fn assessment_json(a: &Assessment) -> serde_json::Value {
    json!({
        "assessment": a,
        "scalingFactor": scoring::scaling_factor(a),
    })
}

fn assessments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let input: AssessmentInput = serde_json::from_value(params.clone())
        .map_err(|e| ServiceError::bad_request(format!("invalid assessment: {}", e)))?;

    let mut questions = input.questions;
    prepare_questions(&mut questions)?;
    let questions_total_marks = input
        .questions_total_marks
        .unwrap_or_else(|| scoring::questions_total_marks(&questions));

    let assessment = Assessment {
        id: Uuid::new_v4().to_string(),
        title: input.title.trim().to_string(),
        max_marks: input.max_marks,
        questions_total_marks: Some(questions_total_marks),
        granularity: input.granularity,
        start_date: input.start_date,
        end_date: input.end_date,
        are_submissions_editable: input.are_submissions_editable,
        questions,
    };
    check_assessment(&assessment)?;
    db::upsert_assessment(conn, &assessment)?;
    info!(
        assessment = %assessment.id,
        granularity = assessment.granularity.as_str(),
        questions = assessment.questions.len(),
        "assessment created"
    );

    Ok(json!({
        "assessmentId": assessment.id,
        "questionsTotalMarks": questions_total_marks,
    }))
}

fn assessments_get(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let assessment = load_assessment(conn, &assessment_id)?;
    Ok(assessment_json(&assessment))
}

fn assessments_list(
    conn: &Connection,
    _params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let rows: Vec<serde_json::Value> = db::list_assessments(conn)?
        .iter()
        .map(|a| {
            json!({
                "id": a.id,
                "title": a.title,
                "granularity": a.granularity,
                "questionCount": a.questions.len(),
                "maxMarks": a.max_marks,
                "startDate": a.start_date,
                "endDate": a.end_date,
            })
        })
        .collect();
    Ok(json!({ "assessments": rows }))
}

fn assessments_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(ServiceError::bad_request("missing patch"));
    };
    let existing = load_assessment(conn, &assessment_id)?;

    let mut doc = serde_json::to_value(&existing)?;
    for key in UPDATABLE_FIELDS {
        if let Some(v) = patch.get(*key) {
            doc[*key] = v.clone();
        }
    }
    let mut updated: Assessment = serde_json::from_value(doc)
        .map_err(|e| ServiceError::bad_request(format!("invalid assessment: {}", e)))?;
    prepare_questions(&mut updated.questions)?;
    if patch.contains_key("questions") && !patch.contains_key("questionsTotalMarks") {
        updated.questions_total_marks = Some(scoring::questions_total_marks(&updated.questions));
    }
    check_assessment(&updated)?;

    db::upsert_assessment(conn, &updated)?;
    info!(assessment = %updated.id, "assessment updated");
    Ok(assessment_json(&updated))
}

fn assessments_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let tx = conn.unchecked_transaction()?;
    if !db::delete_assessment(&tx, &assessment_id)? {
        return Err(ServiceError::not_found("Assessment not found"));
    }
    tx.commit()?;
    info!(assessment = %assessment_id, "assessment deleted");
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.create" => Some(with_db(state, req, assessments_create)),
        "assessments.get" => Some(with_db(state, req, assessments_get)),
        "assessments.list" => Some(with_db(state, req, assessments_list)),
        "assessments.update" => Some(with_db(state, req, assessments_update)),
        "assessments.delete" => Some(with_db(state, req, assessments_delete)),
        _ => None,
    }
}
