//! Anonymized results aggregation.
//!
//! Groups the evaluations targeting one employee by relationship type and
//! reduces them to per-question scale averages and comment lists. Runs over
//! rows the web layer already fetched; any fetch failure aborts the whole
//! computation upstream, no partial aggregation happens here.

use crate::domain::models::{Answer, QuestionKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Group label for evaluations recorded without a relationship type.
pub const DEFAULT_GROUP_LABEL: &str = "General";

/// One evaluation as the aggregator consumes it, most recent first.
#[derive(Clone, Debug)]
pub struct EvaluationInput {
    pub relationship: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub responses: HashMap<Uuid, Answer>,
}

#[derive(Clone, Copy, Debug)]
pub struct SummaryQuestion {
    pub id: Uuid,
    pub kind: QuestionKind,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GroupSummary {
    pub count: usize,
    /// Per scale question: sum of numeric answers divided by the group's
    /// evaluation count -- N/A and missing answers still count in the
    /// divisor, matching the historical computed values.
    pub averages: BTreeMap<Uuid, f64>,
    pub comments: BTreeMap<Uuid, Vec<String>>,
    pub latest: Option<DateTime<Utc>>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Reduces evaluations to a relationship-label -> summary map.
pub fn summarize(
    evaluations: &[EvaluationInput],
    questions: &[SummaryQuestion],
) -> BTreeMap<String, GroupSummary> {
    let mut groups: BTreeMap<String, Vec<&EvaluationInput>> = BTreeMap::new();
    for evaluation in evaluations {
        let label = evaluation
            .relationship
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_GROUP_LABEL);
        groups.entry(label.to_string()).or_default().push(evaluation);
    }

    let mut out = BTreeMap::new();
    for (label, group) in groups {
        let count = group.len();
        let mut averages = BTreeMap::new();
        let mut comments: BTreeMap<Uuid, Vec<String>> = BTreeMap::new();

        for question in questions {
            match question.kind {
                QuestionKind::Scale => {
                    let mut sum = 0.0;
                    for evaluation in &group {
                        match evaluation.responses.get(&question.id) {
                            Some(Answer::Scale { value, comment }) => {
                                if let Some(rating) = value.rating() {
                                    sum += f64::from(rating);
                                }
                                if let Some(text) = comment.as_deref() {
                                    if !text.is_empty() {
                                        comments
                                            .entry(question.id)
                                            .or_default()
                                            .push(text.to_string());
                                    }
                                }
                            }
                            Some(Answer::Paragraph { .. }) | None => {}
                        }
                    }
                    averages.insert(question.id, round1(sum / count as f64));
                }
                QuestionKind::Paragraph => {
                    for evaluation in &group {
                        if let Some(Answer::Paragraph { text }) =
                            evaluation.responses.get(&question.id)
                        {
                            if !text.is_empty() {
                                comments
                                    .entry(question.id)
                                    .or_default()
                                    .push(text.clone());
                            }
                        }
                    }
                }
            }
        }

        let latest = group.iter().map(|e| e.submitted_at).max();
        out.insert(
            label,
            GroupSummary {
                count,
                averages,
                comments,
                latest,
            },
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ScaleValue;
    use chrono::TimeZone;

    fn scale(value: ScaleValue) -> Answer {
        Answer::Scale {
            value,
            comment: None,
        }
    }

    fn paragraph(text: &str) -> Answer {
        Answer::Paragraph {
            text: text.to_string(),
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn evaluation(
        relationship: Option<&str>,
        hour: u32,
        responses: Vec<(Uuid, Answer)>,
    ) -> EvaluationInput {
        EvaluationInput {
            relationship: relationship.map(String::from),
            submitted_at: at(hour),
            responses: responses.into_iter().collect(),
        }
    }

    #[test]
    fn divisor_is_the_group_count_not_the_numeric_count() {
        let q = Uuid::from_u128(1);
        let questions = [SummaryQuestion {
            id: q,
            kind: QuestionKind::Scale,
        }];
        let evaluations = vec![
            evaluation(Some("Peer to Peer"), 3, vec![(q, scale(ScaleValue::Rating(8)))]),
            evaluation(
                Some("Peer to Peer"),
                2,
                vec![(q, scale(ScaleValue::NotApplicable))],
            ),
            evaluation(Some("Peer to Peer"), 1, vec![(q, scale(ScaleValue::Rating(6)))]),
        ];

        let summary = summarize(&evaluations, &questions);
        let group = &summary["Peer to Peer"];
        assert_eq!(group.count, 3);
        // (8 + 6) / 3, not (8 + 6) / 2.
        assert_eq!(group.averages[&q], 4.7);
    }

    #[test]
    fn empty_paragraph_answers_are_dropped() {
        let q = Uuid::from_u128(1);
        let questions = [SummaryQuestion {
            id: q,
            kind: QuestionKind::Paragraph,
        }];
        let evaluations = vec![
            evaluation(Some("Peer to Peer"), 3, vec![(q, paragraph("more demos"))]),
            evaluation(Some("Peer to Peer"), 2, vec![(q, paragraph(""))]),
            evaluation(Some("Peer to Peer"), 1, vec![(q, paragraph("ship notes"))]),
        ];

        let summary = summarize(&evaluations, &questions);
        let group = &summary["Peer to Peer"];
        assert_eq!(
            group.comments[&q],
            vec!["more demos".to_string(), "ship notes".to_string()]
        );
    }

    #[test]
    fn missing_relationship_falls_under_the_default_label() {
        let q = Uuid::from_u128(1);
        let questions = [SummaryQuestion {
            id: q,
            kind: QuestionKind::Scale,
        }];
        let evaluations = vec![
            evaluation(None, 1, vec![(q, scale(ScaleValue::Rating(10)))]),
            evaluation(Some(""), 2, vec![(q, scale(ScaleValue::Rating(6)))]),
            evaluation(Some("Self"), 3, vec![(q, scale(ScaleValue::Rating(4)))]),
        ];

        let summary = summarize(&evaluations, &questions);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[DEFAULT_GROUP_LABEL].count, 2);
        assert_eq!(summary[DEFAULT_GROUP_LABEL].averages[&q], 8.0);
        assert_eq!(summary["Self"].count, 1);
    }

    #[test]
    fn latest_is_the_most_recent_submission_in_the_group() {
        let questions = [];
        let evaluations = vec![
            evaluation(Some("Self"), 4, vec![]),
            evaluation(Some("Self"), 9, vec![]),
            evaluation(Some("Self"), 2, vec![]),
        ];

        let summary = summarize(&evaluations, &questions);
        assert_eq!(summary["Self"].latest, Some(at(9)));
    }

    #[test]
    fn scale_comments_join_the_question_comment_list() {
        let q = Uuid::from_u128(1);
        let questions = [SummaryQuestion {
            id: q,
            kind: QuestionKind::Scale,
        }];
        let evaluations = vec![evaluation(
            Some("Peer to Peer"),
            1,
            vec![(
                q,
                Answer::Scale {
                    value: ScaleValue::Rating(9),
                    comment: Some("great sprint lead".to_string()),
                },
            )],
        )];

        let summary = summarize(&evaluations, &questions);
        let group = &summary["Peer to Peer"];
        assert_eq!(group.comments[&q], vec!["great sprint lead".to_string()]);
        assert_eq!(group.averages[&q], 9.0);
    }

    #[test]
    fn no_evaluations_yields_an_empty_map() {
        let summary = summarize(&[], &[]);
        assert!(summary.is_empty());
    }

    #[test]
    fn unanswered_scale_question_averages_to_zero() {
        let q = Uuid::from_u128(1);
        let questions = [SummaryQuestion {
            id: q,
            kind: QuestionKind::Scale,
        }];
        let evaluations = vec![evaluation(Some("Self"), 1, vec![])];

        let summary = summarize(&evaluations, &questions);
        assert_eq!(summary["Self"].averages[&q], 0.0);
    }
}
