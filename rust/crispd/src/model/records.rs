use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::answer::Answer;
use super::question::Question;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Individual,
    Team,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Individual => "individual",
            Granularity::Team => "team",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub max_marks: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_total_marks: Option<f64>,
    pub granularity: Granularity,
    pub start_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub are_submissions_editable: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Assessment {
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Whether `now` falls inside the submission window.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        if self.start_date > now {
            return false;
        }
        !matches!(self.end_date, Some(end) if end < now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub assessment: String,
    pub user: String,
    pub answers: Vec<Answer>,
    pub is_draft: bool,
    pub submitted_at: DateTime<Utc>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_score: Option<f64>,
}

impl Submission {
    /// Score used for display and final grading.
    pub fn effective_score(&self) -> f64 {
        self.adjusted_score.unwrap_or(self.score)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub marker: String,
    pub submission: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub id: String,
    pub assessment: String,
    pub student: String,
    pub marks: Vec<MarkEntry>,
    pub average_score: f64,
}

impl AssessmentResult {
    pub fn recalculate(&mut self) {
        self.average_score = if self.marks.is_empty() {
            0.0
        } else {
            self.marks.iter().map(|m| m.score).sum::<f64>() / self.marks.len() as f64
        };
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[serde(rename = "Faculty member")]
    FacultyMember,
    #[default]
    #[serde(rename = "Teaching assistant")]
    TeachingAssistant,
    #[serde(rename = "Student")]
    Student,
}

impl Role {
    /// Staff roles may edit any submission regardless of owner or lock.
    pub fn can_bypass_submission_rules(self) -> bool {
        matches!(self, Role::Admin | Role::FacultyMember)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub user: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}
