use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Id of the question this answers.
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(flatten)]
    pub value: AnswerValue,
}

/// Answer payload, tagged `"<question type> Answer"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AnswerValue {
    #[serde(rename = "Multiple Choice Answer")]
    MultipleChoice { value: String },

    #[serde(rename = "Multiple Response Answer")]
    MultipleResponse { values: Vec<String> },

    #[serde(rename = "Scale Answer")]
    Scale { value: f64 },

    #[serde(rename = "Number Answer")]
    Number { value: f64 },

    #[serde(rename = "Short Response Answer")]
    ShortResponse { value: String },

    #[serde(rename = "Long Response Answer")]
    LongResponse { value: String },

    #[serde(rename = "Date Answer", rename_all = "camelCase")]
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_date: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_date: Option<String>,
    },

    #[serde(rename = "NUSNET ID Answer")]
    NusnetId { value: String },

    #[serde(rename = "NUSNET Email Answer")]
    NusnetEmail { value: String },

    #[serde(rename = "Team Member Selection Answer", rename_all = "camelCase")]
    TeamMemberSelection { selected_user_ids: Vec<String> },

    #[serde(rename = "Undecided Answer")]
    Undecided,
}

impl AnswerValue {
    /// Question type this answer kind belongs to.
    pub fn question_type(&self) -> &'static str {
        match self {
            AnswerValue::MultipleChoice { .. } => "Multiple Choice",
            AnswerValue::MultipleResponse { .. } => "Multiple Response",
            AnswerValue::Scale { .. } => "Scale",
            AnswerValue::Number { .. } => "Number",
            AnswerValue::ShortResponse { .. } => "Short Response",
            AnswerValue::LongResponse { .. } => "Long Response",
            AnswerValue::Date { .. } => "Date",
            AnswerValue::NusnetId { .. } => "NUSNET ID",
            AnswerValue::NusnetEmail { .. } => "NUSNET Email",
            AnswerValue::TeamMemberSelection { .. } => "Team Member Selection",
            AnswerValue::Undecided => "Undecided",
        }
    }

    pub fn type_name(&self) -> String {
        format!("{} Answer", self.question_type())
    }
}

impl Answer {
    pub fn selected_user_ids(&self) -> Option<&[String]> {
        match &self.value {
            AnswerValue::TeamMemberSelection { selected_user_ids } => Some(selected_user_ids),
            _ => None,
        }
    }
}

/// Students picked by the first Team Member Selection answer, if there is one.
pub fn selected_students(answers: &[Answer]) -> Option<&[String]> {
    answers.iter().find_map(Answer::selected_user_ids)
}

/// Decode a raw `answers` payload one element at a time so shape errors
/// can name the question they belong to.
pub fn parse_answers(raw: &serde_json::Value) -> ServiceResult<Vec<Answer>> {
    let Some(items) = raw.as_array() else {
        return Err(ServiceError::bad_request("answers must be an array"));
    };
    let mut out = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let question_id = item
            .get("question")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let Some(question_id) = question_id else {
            return Err(ServiceError::bad_request(format!(
                "Answer {} does not reference a question",
                idx
            )));
        };
        let answer: Answer = serde_json::from_value(item.clone()).map_err(|e| {
            ServiceError::bad_request(format!(
                "Invalid answer for question {}: {}",
                question_id, e
            ))
        })?;
        out.push(answer);
    }
    Ok(out)
}
