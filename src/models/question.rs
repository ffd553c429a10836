use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars::JsonSchema;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

/// Question payload, tagged by type so an mcq without options or a code
/// question without test cases cannot be represented.
#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Mcq {
        options: Vec<String>,
        correct_answer: String,
    },
    TrueFalse {
        correct_answer: bool,
    },
    Code {
        #[serde(skip_serializing_if = "Option::is_none")]
        code_template: Option<String>,
        test_cases: Vec<TestCase>,
    },
}

impl QuestionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::Mcq { .. } => "mcq",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::Code { .. } => "code",
        }
    }
}

/// A question as stored, shared between placement tests and final
/// assessments. `parent_id` points at the owning test/project; `mark` is
/// set only on final-project questions (bounded to [0.5, 10]) and defaults
/// to an implicit 1.0 everywhere else.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub parent_id: ObjectId,
    pub question: String,
    pub difficulty: Difficulty,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mark: Option<f64>,
}

impl Question {
    pub fn weight(&self) -> f64 {
        self.mark.unwrap_or(1.0)
    }
}

/// Question view handed to test takers: correct answers and test-case
/// expectations are withheld.
#[derive(Debug, Serialize, JsonSchema)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_template: Option<String>,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        let (options, code_template) = match &q.kind {
            QuestionKind::Mcq { options, .. } => (Some(options.clone()), None),
            QuestionKind::TrueFalse { .. } => (None, None),
            QuestionKind::Code { code_template, .. } => (None, code_template.clone()),
        };

        QuestionView {
            id: q.id.map(|id| id.to_hex()).unwrap_or_default(),
            text: q.question.clone(),
            question_type: q.kind.type_name().to_string(),
            difficulty: q.difficulty,
            options,
            code_template,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_question() -> Question {
        Question {
            id: Some(ObjectId::new()),
            parent_id: ObjectId::new(),
            question: "Implement add(a, b)".into(),
            difficulty: Difficulty::Medium,
            kind: QuestionKind::Code {
                code_template: Some("fn add(a: i32, b: i32) -> i32 { todo!() }".into()),
                test_cases: vec![TestCase {
                    input: "1 2".into(),
                    expected_output: "3".into(),
                }],
            },
            mark: None,
        }
    }

    #[test]
    fn taker_view_withholds_answers() {
        let q = Question {
            id: Some(ObjectId::new()),
            parent_id: ObjectId::new(),
            question: "2 + 2 = ?".into(),
            difficulty: Difficulty::Easy,
            kind: QuestionKind::Mcq {
                options: vec!["3".into(), "4".into()],
                correct_answer: "4".into(),
            },
            mark: None,
        };

        let view = QuestionView::from(&q);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("correct_answer").is_none());
        assert_eq!(json["type"], "mcq");
        assert_eq!(json["options"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn taker_view_keeps_code_template_but_not_test_cases() {
        let view = QuestionView::from(&code_question());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("test_cases").is_none());
        assert!(json["code_template"].as_str().unwrap().contains("add"));
    }

    #[test]
    fn default_weight_is_one() {
        let mut q = code_question();
        assert_eq!(q.weight(), 1.0);
        q.mark = Some(7.5);
        assert_eq!(q.weight(), 7.5);
    }
}
