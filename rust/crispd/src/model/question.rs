use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_scored: bool,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub text: String,
    #[serde(default)]
    pub points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleLabel {
    pub value: f64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumberScoringMethod {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "range")]
    Range,
    #[default]
    #[serde(other)]
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberScoringRange {
    pub min_value: f64,
    pub max_value: f64,
    pub points: f64,
}

/// Variant part of a question, tagged by its `type` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QuestionKind {
    #[serde(rename = "Multiple Choice")]
    MultipleChoice { options: Vec<ChoiceOption> },

    #[serde(rename = "Multiple Response", rename_all = "camelCase")]
    MultipleResponse {
        options: Vec<ChoiceOption>,
        #[serde(default)]
        allow_partial_marks: bool,
        #[serde(default)]
        are_wrong_answers_penalized: bool,
        #[serde(default)]
        allow_negative: bool,
    },

    #[serde(rename = "Scale", rename_all = "camelCase")]
    Scale {
        scale_max: f64,
        #[serde(default)]
        labels: Vec<ScaleLabel>,
    },

    #[serde(rename = "Number", rename_all = "camelCase")]
    Number {
        max_number: f64,
        #[serde(default)]
        scoring_method: NumberScoringMethod,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_points: Option<f64>,
        #[serde(default)]
        scoring_ranges: Vec<NumberScoringRange>,
    },

    #[serde(rename = "Short Response")]
    ShortResponse,

    #[serde(rename = "Long Response")]
    LongResponse,

    #[serde(rename = "Date", rename_all = "camelCase")]
    Date {
        #[serde(default)]
        is_range: bool,
    },

    #[serde(rename = "NUSNET ID")]
    NusnetId,

    #[serde(rename = "NUSNET Email")]
    NusnetEmail,

    #[serde(rename = "Team Member Selection")]
    TeamMemberSelection,

    #[serde(rename = "Undecided")]
    Undecided,
}

impl QuestionKind {
    /// The `type` tag as it appears on the wire.
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice { .. } => "Multiple Choice",
            QuestionKind::MultipleResponse { .. } => "Multiple Response",
            QuestionKind::Scale { .. } => "Scale",
            QuestionKind::Number { .. } => "Number",
            QuestionKind::ShortResponse => "Short Response",
            QuestionKind::LongResponse => "Long Response",
            QuestionKind::Date { .. } => "Date",
            QuestionKind::NusnetId => "NUSNET ID",
            QuestionKind::NusnetEmail => "NUSNET Email",
            QuestionKind::TeamMemberSelection => "Team Member Selection",
            QuestionKind::Undecided => "Undecided",
        }
    }
}
