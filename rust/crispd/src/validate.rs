use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::{ServiceError, ServiceResult};
use crate::model::{Answer, AnswerValue, Assessment, Granularity, QuestionKind};

/// Check every answer against its question before anything is scored.
///
/// The first violation rejects the whole answer set.
pub fn validate_answers(assessment: &Assessment, answers: &[Answer]) -> ServiceResult<()> {
    for answer in answers {
        validate_answer(assessment, answer)?;
    }
    Ok(())
}

fn validate_answer(assessment: &Assessment, answer: &Answer) -> ServiceResult<()> {
    let question_id = answer.question.as_str();
    let Some(question) = assessment.question(question_id) else {
        return Err(ServiceError::bad_request(format!(
            "Question {} not found in this assessment",
            question_id
        )));
    };

    if answer.value.question_type() != question.kind.type_name() {
        return Err(ServiceError::bad_request(format!(
            "Answer type \"{}\" does not match question type \"{}\" for question {}",
            answer.value.type_name(),
            question.kind.type_name(),
            question_id
        )));
    }

    match (&question.kind, &answer.value) {
        (QuestionKind::NusnetId, AnswerValue::NusnetId { .. })
        | (QuestionKind::NusnetEmail, AnswerValue::NusnetEmail { .. })
        | (QuestionKind::ShortResponse, AnswerValue::ShortResponse { .. })
        | (QuestionKind::LongResponse, AnswerValue::LongResponse { .. }) => Ok(()),

        (
            QuestionKind::TeamMemberSelection,
            AnswerValue::TeamMemberSelection { selected_user_ids },
        ) => {
            if assessment.granularity == Granularity::Individual && selected_user_ids.len() > 1 {
                return Err(ServiceError::bad_request(format!(
                    "Only one team member can be selected for question {}",
                    question_id
                )));
            }
            Ok(())
        }

        (QuestionKind::MultipleChoice { options }, AnswerValue::MultipleChoice { value }) => {
            if !options.iter().any(|o| o.text == *value) {
                return Err(invalid_option(question_id));
            }
            Ok(())
        }

        (
            QuestionKind::MultipleResponse { options, .. },
            AnswerValue::MultipleResponse { values },
        ) => {
            for v in values {
                if !options.iter().any(|o| o.text == *v) {
                    return Err(invalid_option(question_id));
                }
            }
            Ok(())
        }

        (QuestionKind::Scale { scale_max, .. }, AnswerValue::Scale { value }) => {
            if *value < 1.0 || *value > *scale_max {
                return Err(ServiceError::bad_request(format!(
                    "Invalid scale value for question {}",
                    question_id
                )));
            }
            Ok(())
        }

        (
            QuestionKind::Date { is_range },
            AnswerValue::Date {
                value,
                start_date,
                end_date,
            },
        ) => {
            if *is_range {
                let start = start_date.as_deref().and_then(parse_date);
                let end = end_date.as_deref().and_then(parse_date);
                if start.is_none() || end.is_none() {
                    return Err(ServiceError::bad_request(format!(
                        "Invalid date range provided for question {}",
                        question_id
                    )));
                }
            } else if value.as_deref().and_then(parse_date).is_none() {
                return Err(ServiceError::bad_request(format!(
                    "Invalid date provided for question {}",
                    question_id
                )));
            }
            Ok(())
        }

        (QuestionKind::Number { max_number, .. }, AnswerValue::Number { value }) => {
            if *value < 0.0 || *value > *max_number {
                return Err(ServiceError::bad_request(format!(
                    "Invalid number value for question {}",
                    question_id
                )));
            }
            Ok(())
        }

        (QuestionKind::Undecided, _) => Err(ServiceError::bad_request(format!(
            "Unsupported question type for question {}",
            question_id
        ))),

        (kind, _) => Err(ServiceError::bad_request(format!(
            "Invalid {} answer for question {}",
            kind.type_name(),
            question_id
        ))),
    }
}

fn invalid_option(question_id: &str) -> ServiceError {
    ServiceError::bad_request(format!(
        "Invalid option selected for question {}",
        question_id
    ))
}

/// Accepts RFC 3339 timestamps, naive `YYYY-MM-DDTHH:MM[:SS]`, or plain dates.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
