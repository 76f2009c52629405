use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "period_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    Draft,
    Published,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "assignment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Completed,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Scale,
    Paragraph,
}

/// `Self`-scoped questions only appear on self evaluations.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "question_scope", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QuestionScope {
    All,
    #[sqlx(rename = "self")]
    #[serde(rename = "self")]
    SelfOnly,
}

/// A scale answer: an integer rating, or the "N/A" sentinel the form offers
/// next to the 1-10 buttons. On the wire it is a JSON number or the literal
/// string "N/A".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleValue {
    Rating(i16),
    NotApplicable,
}

pub const SCALE_MIN: i16 = 1;
pub const SCALE_MAX: i16 = 10;

impl ScaleValue {
    pub fn rating(&self) -> Option<i16> {
        match self {
            ScaleValue::Rating(v) => Some(*v),
            ScaleValue::NotApplicable => None,
        }
    }

    pub fn in_range(&self) -> bool {
        match self {
            ScaleValue::Rating(v) => (SCALE_MIN..=SCALE_MAX).contains(v),
            ScaleValue::NotApplicable => true,
        }
    }
}

impl Serialize for ScaleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScaleValue::Rating(v) => serializer.serialize_i16(*v),
            ScaleValue::NotApplicable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for ScaleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Num(i16),
            Text(String),
        }
        match Wire::deserialize(deserializer)? {
            Wire::Num(v) => Ok(ScaleValue::Rating(v)),
            Wire::Text(s) if s == "N/A" => Ok(ScaleValue::NotApplicable),
            Wire::Text(other) => Err(de::Error::custom(format!(
                "expected a rating or \"N/A\", got {other:?}"
            ))),
        }
    }
}

/// One submitted answer, tagged by question kind. Replaces the loose
/// question-id -> anything map (with ad hoc `_comment` keys) the stored
/// documents originally used.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Answer {
    Scale {
        value: ScaleValue,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        comment: Option<String>,
    },
    Paragraph {
        text: String,
    },
}

impl Answer {
    pub fn matches(&self, kind: QuestionKind) -> bool {
        matches!(
            (self, kind),
            (Answer::Scale { .. }, QuestionKind::Scale)
                | (Answer::Paragraph { .. }, QuestionKind::Paragraph)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_value_wire_forms() {
        let rating: ScaleValue = serde_json::from_str("7").unwrap();
        assert_eq!(rating, ScaleValue::Rating(7));

        let na: ScaleValue = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(na, ScaleValue::NotApplicable);

        assert_eq!(serde_json::to_string(&ScaleValue::Rating(7)).unwrap(), "7");
        assert_eq!(
            serde_json::to_string(&ScaleValue::NotApplicable).unwrap(),
            "\"N/A\""
        );

        assert!(serde_json::from_str::<ScaleValue>("\"maybe\"").is_err());
    }

    #[test]
    fn answer_tagging() {
        let answer: Answer =
            serde_json::from_str(r#"{"kind":"scale","value":9,"comment":"solid quarter"}"#)
                .unwrap();
        assert!(answer.matches(QuestionKind::Scale));
        assert!(!answer.matches(QuestionKind::Paragraph));

        let answer: Answer =
            serde_json::from_str(r#"{"kind":"paragraph","text":"keep pairing"}"#).unwrap();
        assert!(answer.matches(QuestionKind::Paragraph));
    }

    #[test]
    fn out_of_range_rating_detected() {
        assert!(!ScaleValue::Rating(0).in_range());
        assert!(!ScaleValue::Rating(11).in_range());
        assert!(ScaleValue::Rating(1).in_range());
        assert!(ScaleValue::Rating(10).in_range());
        assert!(ScaleValue::NotApplicable.in_range());
    }
}
