mod answer;
mod question;
mod records;

pub use answer::{parse_answers, selected_students, Answer, AnswerValue};
pub use question::{
    ChoiceOption, NumberScoringMethod, NumberScoringRange, Question, QuestionKind, ScaleLabel,
};
pub use records::{
    Account, Assessment, AssessmentResult, Granularity, MarkEntry, Role, Submission, User,
};
