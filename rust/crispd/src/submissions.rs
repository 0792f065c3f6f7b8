use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db;
use crate::error::{ServiceError, ServiceResult};
use crate::model::{selected_students, Answer, Assessment, AssessmentResult, MarkEntry, Submission};
use crate::scoring;
use crate::validate::validate_answers;

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub assessment_id: String,
    pub user_id: String,
    pub answers: Vec<Answer>,
    pub is_draft: bool,
}

#[derive(Debug, Clone)]
pub struct SubmissionUpdate {
    pub submission_id: String,
    pub user_id: String,
    pub account_id: Option<String>,
    pub answers: Vec<Answer>,
    pub is_draft: bool,
}

#[derive(Debug, Clone)]
pub struct ScoredAnswers {
    pub answers: Vec<Answer>,
    pub total: f64,
}

pub fn load_assessment(conn: &Connection, assessment_id: &str) -> ServiceResult<Assessment> {
    db::get_assessment(conn, assessment_id)?
        .ok_or_else(|| ServiceError::not_found("Assessment not found"))
}

/// Totals closer than this are treated as unchanged.
const SCORE_TOLERANCE: f64 = 1e-9;

pub fn validate_submission_period(
    assessment: &Assessment,
    now: DateTime<Utc>,
) -> ServiceResult<()> {
    if !assessment.is_open_at(now) {
        return Err(ServiceError::bad_request(
            "Assessment is not open for submissions at this time",
        ));
    }
    Ok(())
}

/// Attach a scaled score to every answer and sum them.
///
/// Answers are expected to have passed validation; one whose question is
/// missing scores 0.
pub fn score_answers(assessment: &Assessment, answers: Vec<Answer>) -> ScoredAnswers {
    let mut total = 0.0;
    let answers = answers
        .into_iter()
        .map(|mut answer| {
            let score = match assessment.question(&answer.question) {
                Some(question) => scoring::score_answer(question, &answer.value, assessment),
                None => 0.0,
            };
            debug!(question = %answer.question, score, "scored answer");
            total += score;
            answer.score = Some(score);
            if answer.id.is_none() {
                answer.id = Some(Uuid::new_v4().to_string());
            }
            answer
        })
        .collect();
    ScoredAnswers { answers, total }
}

/// Validate and score without writing anything.
pub fn preview(assessment: &Assessment, answers: Vec<Answer>) -> ServiceResult<ScoredAnswers> {
    validate_answers(assessment, &answers)?;
    Ok(score_answers(assessment, answers))
}

/// Rejects a marker submitting a second time for any of `student_ids`.
pub fn check_submission_uniqueness(
    conn: &Connection,
    assessment: &Assessment,
    user_id: &str,
    student_ids: &[String],
) -> ServiceResult<()> {
    let previous = db::list_submissions(conn, &assessment.id, Some(user_id))?;
    let already: HashSet<&str> = previous
        .iter()
        .filter_map(|s| selected_students(&s.answers))
        .flatten()
        .map(|s| s.as_str())
        .collect();
    if let Some(dup) = student_ids.iter().find(|id| already.contains(id.as_str())) {
        return Err(ServiceError::bad_request(format!(
            "A submission for student {} already exists",
            dup
        )));
    }
    Ok(())
}

/// Selected student ids in answer order, each listed once.
fn require_selection(answers: &[Answer]) -> ServiceResult<Vec<String>> {
    let ids = match selected_students(answers) {
        Some(ids) if !ids.is_empty() => ids,
        _ => return Err(ServiceError::bad_request("Student(s) must be selected!")),
    };
    let mut seen = HashSet::new();
    Ok(ids
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect())
}

fn score_changed(previous: f64, current: f64) -> bool {
    (previous - current).abs() > SCORE_TOLERANCE
}

/// Drops the submission's mark entries from every result whose student is
/// not in `keep`, recalculating the averages that changed.
fn drop_mark_entries(
    conn: &Connection,
    assessment_id: &str,
    submission_id: &str,
    keep: &[String],
) -> ServiceResult<()> {
    for mut result in db::list_results(conn, assessment_id)? {
        if keep.contains(&result.student) {
            continue;
        }
        let before = result.marks.len();
        result.marks.retain(|m| m.submission != submission_id);
        if result.marks.len() != before {
            result.recalculate();
            db::upsert_result(conn, &result)?;
        }
    }
    Ok(())
}

pub fn create_submission(
    conn: &Connection,
    input: NewSubmission,
    now: DateTime<Utc>,
) -> ServiceResult<Submission> {
    let assessment = load_assessment(conn, &input.assessment_id)?;
    if db::get_user(conn, &input.user_id)?.is_none() {
        return Err(ServiceError::not_found("Submission creator not found"));
    }

    validate_submission_period(&assessment, now)?;
    validate_answers(&assessment, &input.answers)?;
    let students = require_selection(&input.answers)?;
    check_submission_uniqueness(conn, &assessment, &input.user_id, &students)?;

    let scored = score_answers(&assessment, input.answers);
    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        assessment: assessment.id.clone(),
        user: input.user_id.clone(),
        answers: scored.answers,
        is_draft: input.is_draft,
        submitted_at: now,
        score: scored.total,
        adjusted_score: None,
    };

    let tx = conn.unchecked_transaction()?;
    db::insert_submission(&tx, &submission)?;
    for student_id in &students {
        let mut result = match db::find_result(&tx, &assessment.id, student_id)? {
            Some(r) => r,
            None => AssessmentResult {
                id: Uuid::new_v4().to_string(),
                assessment: assessment.id.clone(),
                student: student_id.clone(),
                marks: Vec::new(),
                average_score: 0.0,
            },
        };
        result.marks.push(MarkEntry {
            marker: input.user_id.clone(),
            submission: submission.id.clone(),
            score: submission.score,
        });
        result.recalculate();
        db::upsert_result(&tx, &result)?;
    }
    tx.commit()?;

    info!(
        submission = %submission.id,
        assessment = %assessment.id,
        score = submission.score,
        students = students.len(),
        "submission created"
    );
    Ok(submission)
}

pub fn update_submission(
    conn: &Connection,
    input: SubmissionUpdate,
    now: DateTime<Utc>,
) -> ServiceResult<Submission> {
    let mut submission = db::get_submission(conn, &input.submission_id)?
        .ok_or_else(|| ServiceError::not_found("Submission not found"))?;
    if db::get_user(conn, &input.user_id)?.is_none() {
        return Err(ServiceError::not_found("Submission updater not found"));
    }

    let bypass = match input.account_id.as_deref() {
        Some(account_id) => db::get_account(conn, account_id)?
            .map(|a| a.role.can_bypass_submission_rules())
            .unwrap_or(false),
        None => false,
    };
    if !bypass && submission.user != input.user_id {
        return Err(ServiceError::bad_request(
            "You do not have permission to update this submission.",
        ));
    }

    let assessment = load_assessment(conn, &submission.assessment)?;
    validate_submission_period(&assessment, now)?;
    validate_answers(&assessment, &input.answers)?;

    if !bypass && !assessment.are_submissions_editable && !submission.is_draft {
        return Err(ServiceError::bad_request(
            "Submissions are not editable for this assessment",
        ));
    }
    let students = require_selection(&input.answers)?;

    let answers = carry_answer_ids(&submission.answers, input.answers);
    let scored = score_answers(&assessment, answers);

    submission.answers = scored.answers;
    submission.is_draft = input.is_draft;
    submission.submitted_at = now;
    if score_changed(submission.score, scored.total) {
        submission.score = scored.total;
        submission.adjusted_score = None;
    }

    let tx = conn.unchecked_transaction()?;
    db::update_submission(&tx, &submission)?;
    for student_id in &students {
        let mut result = db::find_result(&tx, &assessment.id, student_id)?.ok_or_else(|| {
            ServiceError::not_found(format!(
                "No previous assessment result found for student {}",
                student_id
            ))
        })?;
        let entry = result
            .marks
            .iter_mut()
            .find(|m| m.submission == submission.id)
            .ok_or_else(|| {
                ServiceError::not_found(
                    "Mark entry for this submission not found in assessment result.",
                )
            })?;
        entry.marker = input.user_id.clone();
        entry.score = submission.score;
        result.recalculate();
        db::upsert_result(&tx, &result)?;
    }
    drop_mark_entries(&tx, &assessment.id, &submission.id, &students)?;
    tx.commit()?;

    info!(
        submission = %submission.id,
        score = submission.score,
        adjusted = submission.adjusted_score.is_some(),
        "submission updated"
    );
    Ok(submission)
}

/// Incoming answers without an id keep the id stored for the same question.
fn carry_answer_ids(previous: &[Answer], incoming: Vec<Answer>) -> Vec<Answer> {
    incoming
        .into_iter()
        .map(|mut a| {
            if a.id.is_none() {
                a.id = previous
                    .iter()
                    .find(|p| p.question == a.question)
                    .and_then(|p| p.id.clone());
            }
            a
        })
        .collect()
}

pub fn adjust_submission_score(
    conn: &Connection,
    submission_id: &str,
    adjusted_score: f64,
) -> ServiceResult<Submission> {
    let mut submission = db::get_submission(conn, submission_id)?
        .ok_or_else(|| ServiceError::not_found("Submission not found"))?;
    if adjusted_score < 0.0 {
        return Err(ServiceError::bad_request("Adjusted score cannot be negative."));
    }
    submission.adjusted_score = Some(adjusted_score);
    db::update_submission(conn, &submission)?;
    info!(submission = %submission.id, adjusted_score, "submission score adjusted");
    Ok(submission)
}

/// Deletes the submission and drops its mark entries from every result.
pub fn delete_submission(conn: &Connection, submission_id: &str) -> ServiceResult<()> {
    let submission = db::get_submission(conn, submission_id)?
        .ok_or_else(|| ServiceError::not_found("Submission not found"))?;

    let tx = conn.unchecked_transaction()?;
    drop_mark_entries(&tx, &submission.assessment, &submission.id, &[])?;
    db::delete_submission(&tx, &submission.id)?;
    tx.commit()?;

    info!(submission = %submission.id, "submission deleted");
    Ok(())
}
