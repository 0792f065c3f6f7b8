use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::ipc::helpers::{required_str, with_db};
use crate::ipc::types::{AppState, Request};
use crate::submissions::load_assessment;
use rusqlite::Connection;
use serde_json::json;

fn results_list_by_assessment(
    conn: &Connection,
    params: &serde_json::Value,
) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    load_assessment(conn, &assessment_id)?;
    Ok(json!({ "results": db::list_results(conn, &assessment_id)? }))
}

fn results_get(conn: &Connection, params: &serde_json::Value) -> ServiceResult<serde_json::Value> {
    let assessment_id = required_str(params, "assessmentId")?;
    let student_id = required_str(params, "studentId")?;
    let result = db::find_result(conn, &assessment_id, &student_id)?
        .ok_or_else(|| ServiceError::not_found("Assessment result not found"))?;
    Ok(json!({ "result": result }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.listByAssessment" => Some(with_db(state, req, results_list_by_assessment)),
        "results.get" => Some(with_db(state, req, results_get)),
        _ => None,
    }
}
