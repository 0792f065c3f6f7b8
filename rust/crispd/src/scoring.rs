use crate::model::{
    AnswerValue, Assessment, ChoiceOption, NumberScoringMethod, NumberScoringRange, Question,
    QuestionKind, ScaleLabel,
};
use std::cmp::Ordering;

/// Ratio that normalizes raw question points to the assessment's `maxMarks`.
///
/// Falls back to 1 when either side is zero or unset.
pub fn scaling_factor(assessment: &Assessment) -> f64 {
    if assessment.max_marks == 0.0 {
        return 1.0;
    }
    match assessment.questions_total_marks {
        Some(total) if total != 0.0 => assessment.max_marks / total,
        _ => 1.0,
    }
}

/// Scaled score for one answer.
pub fn score_answer(question: &Question, answer: &AnswerValue, assessment: &Assessment) -> f64 {
    raw_score(question, answer) * scaling_factor(assessment)
}

/// Unscaled score for one (question, answer) pair.
///
/// Kinds without a scoring rule, unscored questions, and answers whose kind
/// does not match the question all score 0.
pub fn raw_score(question: &Question, answer: &AnswerValue) -> f64 {
    if !question.is_scored {
        return 0.0;
    }
    match (&question.kind, answer) {
        (QuestionKind::MultipleChoice { options }, AnswerValue::MultipleChoice { value }) => {
            multiple_choice_score(options, value)
        }
        (
            QuestionKind::MultipleResponse {
                options,
                allow_partial_marks,
                are_wrong_answers_penalized,
                allow_negative,
            },
            AnswerValue::MultipleResponse { values },
        ) => multiple_response_score(
            options,
            values,
            MultipleResponseRules {
                allow_partial_marks: *allow_partial_marks,
                are_wrong_answers_penalized: *are_wrong_answers_penalized,
                allow_negative: *allow_negative,
            },
        ),
        (QuestionKind::Scale { labels, .. }, AnswerValue::Scale { value }) => {
            scale_score(labels, *value)
        }
        (
            QuestionKind::Number {
                max_number,
                scoring_method,
                max_points,
                scoring_ranges,
            },
            AnswerValue::Number { value },
        ) => match scoring_method {
            NumberScoringMethod::Direct => {
                direct_number_score(*max_number, max_points.unwrap_or(0.0), *value)
            }
            NumberScoringMethod::Range => range_number_score(scoring_ranges, *value),
            NumberScoringMethod::None => 0.0,
        },
        _ => 0.0,
    }
}

pub fn multiple_choice_score(options: &[ChoiceOption], value: &str) -> f64 {
    options
        .iter()
        .find(|o| o.text == value)
        .map(|o| o.points)
        .unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultipleResponseRules {
    pub allow_partial_marks: bool,
    pub are_wrong_answers_penalized: bool,
    pub allow_negative: bool,
}

pub fn multiple_response_score(
    options: &[ChoiceOption],
    values: &[String],
    rules: MultipleResponseRules,
) -> f64 {
    let is_chosen = |o: &ChoiceOption| values.iter().any(|v| *v == o.text);
    let chosen: Vec<&ChoiceOption> = options.iter().filter(|o| is_chosen(*o)).collect();
    let chosen_sum: f64 = chosen.iter().map(|o| o.points).sum();

    if !rules.allow_partial_marks {
        let all_correct_chosen = options
            .iter()
            .filter(|o| o.points > 0.0)
            .all(|o| is_chosen(o));
        let chosen_has_incorrect = chosen.iter().any(|o| o.points <= 0.0);
        if !all_correct_chosen || chosen_has_incorrect {
            return 0.0;
        }
        // A perfect answer never holds a non-positive option; the floor is kept anyway.
        return chosen_sum.max(0.0);
    }

    if rules.are_wrong_answers_penalized && rules.allow_negative {
        chosen_sum
    } else {
        chosen_sum.max(0.0)
    }
}

/// Piecewise-linear score over the question's labels.
pub fn scale_score(labels: &[ScaleLabel], value: f64) -> f64 {
    let mut sorted: Vec<&ScaleLabel> = labels.iter().collect();
    sorted.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return 0.0;
    };
    if value <= first.value {
        return first.points;
    }
    if value >= last.value {
        return last.points;
    }

    for pair in sorted.windows(2) {
        let (current, next) = (pair[0], pair[1]);
        if value == current.value {
            return current.points;
        }
        if value == next.value {
            return next.points;
        }
        if value > current.value && value < next.value {
            return interpolate((current.value, current.points), (next.value, next.points), value);
        }
    }
    0.0
}

pub fn direct_number_score(max_number: f64, max_points: f64, value: f64) -> f64 {
    if max_number == 0.0 {
        return 0.0;
    }
    (value / max_number) * max_points
}

/// Points of the range containing `value`, or a blend of its neighbours.
pub fn range_number_score(ranges: &[NumberScoringRange], value: f64) -> f64 {
    let mut sorted: Vec<&NumberScoringRange> = ranges.iter().collect();
    sorted.sort_by(|a, b| {
        a.min_value
            .partial_cmp(&b.min_value)
            .unwrap_or(Ordering::Equal)
    });

    if let Some(hit) = sorted
        .iter()
        .find(|r| value >= r.min_value && value <= r.max_value)
    {
        return hit.points;
    }

    let mut lower: Option<&NumberScoringRange> = None;
    let mut higher: Option<&NumberScoringRange> = None;
    for &range in &sorted {
        if range.max_value < value {
            lower = Some(range);
        } else if range.min_value > value {
            higher = Some(range);
            break;
        }
    }

    match (lower, higher) {
        (Some(lo), Some(hi)) => {
            interpolate((lo.max_value, lo.points), (hi.min_value, hi.points), value)
        }
        (Some(lo), None) => lo.points,
        (None, Some(hi)) => hi.points,
        (None, None) => 0.0,
    }
}

fn interpolate(from: (f64, f64), to: (f64, f64), x: f64) -> f64 {
    let slope = (to.1 - from.1) / (to.0 - from.0);
    from.1 + slope * (x - from.0)
}

/// Best raw score a question can award.
pub fn max_question_points(question: &Question) -> f64 {
    if !question.is_scored {
        return 0.0;
    }
    match &question.kind {
        QuestionKind::MultipleChoice { options } => best_of(options.iter().map(|o| o.points)),
        QuestionKind::MultipleResponse { options, .. } => options
            .iter()
            .map(|o| o.points)
            .filter(|p| *p > 0.0)
            .sum(),
        QuestionKind::Scale { labels, .. } => best_of(labels.iter().map(|l| l.points)),
        QuestionKind::Number {
            scoring_method,
            max_points,
            scoring_ranges,
            ..
        } => match scoring_method {
            NumberScoringMethod::Direct => max_points.unwrap_or(0.0).max(0.0),
            NumberScoringMethod::Range => best_of(scoring_ranges.iter().map(|r| r.points)),
            NumberScoringMethod::None => 0.0,
        },
        QuestionKind::ShortResponse
        | QuestionKind::LongResponse
        | QuestionKind::Date { .. }
        | QuestionKind::NusnetId
        | QuestionKind::NusnetEmail
        | QuestionKind::TeamMemberSelection
        | QuestionKind::Undecided => 0.0,
    }
}

fn best_of(points: impl Iterator<Item = f64>) -> f64 {
    points.fold(0.0_f64, f64::max)
}

pub fn questions_total_marks(questions: &[Question]) -> f64 {
    questions.iter().map(max_question_points).sum()
}
