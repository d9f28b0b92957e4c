//! Question content and the question bank boundary
//!
//! Questions are immutable once built. A match receives them as
//! `Arc<Question>` from a [`QuestionBank`] and only ever reads them.

use std::{collections::HashSet, sync::Arc};

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use thiserror::Error;

use crate::constants::{game::MAX_QUESTION_COUNT, question as limits};

/// Identifier of a question, unique within a bank
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    derive_more::Display, derive_more::From,
)]
#[serde(transparent)]
#[from(forward)]
pub struct QuestionId(String);

/// Identifier of an option, unique within its question
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    derive_more::Display, derive_more::From,
)]
#[serde(transparent)]
#[from(forward)]
pub struct OptionId(String);

/// How hard a question is considered to be
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Introductory questions
    Easy,
    /// Default difficulty
    #[default]
    Medium,
    /// Questions for experienced players
    Hard,
}

/// One selectable answer of a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct AnswerOption {
    /// Identifier referenced by submissions
    #[garde(skip)]
    pub id: OptionId,
    /// Text shown to participants
    #[garde(length(min = 1, max = limits::MAX_OPTION_LENGTH))]
    pub text: String,
}

/// Rejects option lists that reuse an identifier
fn validate_unique_options(options: &[AnswerOption], _ctx: &()) -> garde::Result {
    if options.iter().map(|option| &option.id).all_unique() {
        Ok(())
    } else {
        Err(garde::Error::new("option ids must be unique"))
    }
}

/// Requires the correct option to be one of the listed options
fn is_listed_option(options: &[AnswerOption]) -> impl FnOnce(&OptionId, &()) -> garde::Result + '_ {
    move |correct, _| {
        if options.iter().any(|option| &option.id == correct) {
            Ok(())
        } else {
            Err(garde::Error::new(format!(
                "correct option {correct} is not one of the options"
            )))
        }
    }
}

/// A multiple choice question
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Question {
    #[garde(skip)]
    id: QuestionId,
    #[garde(length(min = 1, max = limits::MAX_PROMPT_LENGTH))]
    prompt: String,
    /// Optional reference to an image shown with the prompt
    #[garde(skip)]
    #[serde(default)]
    image: Option<String>,
    #[garde(
        length(min = limits::MIN_OPTION_COUNT, max = limits::MAX_OPTION_COUNT),
        custom(validate_unique_options),
        dive
    )]
    options: Vec<AnswerOption>,
    #[garde(custom(is_listed_option(&self.options)))]
    correct_option_id: OptionId,
    #[garde(length(max = limits::MAX_EXPLANATION_LENGTH))]
    #[serde(default)]
    explanation: String,
    #[garde(skip)]
    #[serde(default)]
    subject: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    difficulty: Difficulty,
}

impl Question {
    /// Creates a question from its prompt and `(option_id, text)` pairs
    ///
    /// The question is not validated here; banks validate on construction.
    pub fn new<I, O, T>(
        id: impl Into<QuestionId>,
        prompt: impl Into<String>,
        options: I,
        correct_option_id: impl Into<OptionId>,
        explanation: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = (O, T)>,
        O: Into<OptionId>,
        T: Into<String>,
    {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            image: None,
            options: options
                .into_iter()
                .map(|(id, text)| AnswerOption {
                    id: id.into(),
                    text: text.into(),
                })
                .collect(),
            correct_option_id: correct_option_id.into(),
            explanation: explanation.into(),
            subject: None,
            difficulty: Difficulty::default(),
        }
    }

    /// Attaches an image reference to the prompt
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Files the question under a subject
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Sets the question's difficulty
    #[must_use]
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// The question's identifier
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    /// The question text
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Optional image reference
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    /// The options in display order
    pub fn options(&self) -> &[AnswerOption] {
        &self.options
    }

    /// Identifier of the correct option
    pub fn correct_option_id(&self) -> &OptionId {
        &self.correct_option_id
    }

    /// Explanation revealed after the question closes
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Subject the question is filed under, if any
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The question's difficulty
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Whether `option` is one of this question's options
    pub fn has_option(&self, option: &OptionId) -> bool {
        self.options.iter().any(|o| &o.id == option)
    }

    /// Whether `option` is the correct answer
    pub fn is_correct(&self, option: &OptionId) -> bool {
        &self.correct_option_id == option
    }

    /// The question as participants may see it while it is open
    pub fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            prompt: self.prompt.clone(),
            image: self.image.clone(),
            options: self.options.clone(),
        }
    }
}

/// A question without its answer, safe to send while the question is open
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    /// The question's identifier
    pub id: QuestionId,
    /// The question text
    pub prompt: String,
    /// Optional image reference
    pub image: Option<String>,
    /// The selectable options
    pub options: Vec<AnswerOption>,
}

/// Selects which questions a match is played with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct BankQuery {
    /// Only questions filed under this subject
    #[garde(skip)]
    #[serde(default)]
    pub subject: Option<String>,
    /// Only questions of this difficulty
    #[garde(skip)]
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    /// Number of questions to play
    #[garde(range(min = 1, max = MAX_QUESTION_COUNT))]
    pub count: usize,
}

impl BankQuery {
    /// A query for the first `count` questions of any subject and difficulty
    pub fn any(count: usize) -> Self {
        Self {
            subject: None,
            difficulty: None,
            count,
        }
    }

    fn matches(&self, question: &Question) -> bool {
        self.subject
            .as_deref()
            .is_none_or(|subject| question.subject() == Some(subject))
            && self
                .difficulty
                .is_none_or(|difficulty| question.difficulty() == difficulty)
    }
}

/// Errors produced by question banks
#[derive(Error, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A question failed content validation
    #[error("question {id} is invalid: {reason}")]
    Invalid {
        /// The offending question
        id: QuestionId,
        /// Validation report
        reason: String,
    },
    /// Two questions share an identifier
    #[error("duplicate question id {0}")]
    DuplicateId(QuestionId),
    /// The query itself is out of bounds
    #[error("invalid question query: {0}")]
    InvalidQuery(String),
    /// Fewer questions match the query than were requested
    #[error("requested {requested} questions but only {available} match")]
    NotEnoughQuestions {
        /// Number of questions asked for
        requested: usize,
        /// Number of questions matching the filters
        available: usize,
    },
    /// A question document could not be parsed
    #[error("malformed question document: {0}")]
    Malformed(String),
}

/// Source of the questions a match is played with
///
/// Implementations must be deterministic: the same query always yields the
/// same questions in the same order.
pub trait QuestionBank {
    /// Returns the ordered questions selected by `query`
    ///
    /// # Errors
    ///
    /// Returns an error if the query is invalid or cannot be satisfied.
    fn questions(&self, query: &BankQuery) -> Result<Vec<Arc<Question>>, Error>;
}

/// A validated, in-memory list of questions
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    questions: Vec<Arc<Question>>,
}

impl InMemoryBank {
    /// Builds a bank, validating every question
    ///
    /// # Errors
    ///
    /// Returns [`Error::Invalid`] for the first question failing validation and
    /// [`Error::DuplicateId`] if two questions share an identifier.
    pub fn new(questions: Vec<Question>) -> Result<Self, Error> {
        let mut seen = HashSet::new();

        for question in &questions {
            question.validate().map_err(|report| Error::Invalid {
                id: question.id.clone(),
                reason: report.to_string(),
            })?;

            if !seen.insert(question.id.clone()) {
                return Err(Error::DuplicateId(question.id.clone()));
            }
        }

        Ok(Self {
            questions: questions.into_iter().map(Arc::new).collect(),
        })
    }

    /// Builds a bank from a JSON array of questions
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the document does not parse, otherwise
    /// the same errors as [`InMemoryBank::new`].
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let questions: Vec<Question> =
            serde_json::from_str(json).map_err(|e| Error::Malformed(e.to_string()))?;
        Self::new(questions)
    }

    /// Number of questions in the bank
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the bank has no questions
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

impl QuestionBank for InMemoryBank {
    fn questions(&self, query: &BankQuery) -> Result<Vec<Arc<Question>>, Error> {
        query
            .validate()
            .map_err(|report| Error::InvalidQuery(report.to_string()))?;

        let selected = self
            .questions
            .iter()
            .filter(|question| query.matches(question))
            .take(query.count)
            .cloned()
            .collect_vec();

        if selected.len() < query.count {
            return Err(Error::NotEnoughQuestions {
                requested: query.count,
                available: selected.len(),
            });
        }

        Ok(selected)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn capital(id: &str, subject: &str, difficulty: Difficulty) -> Question {
        Question::new(
            id,
            "What is the capital of France?",
            [("a", "Paris"), ("b", "Lyon"), ("c", "Nice")],
            "a",
            "Paris has been the capital since 987.",
        )
        .with_subject(subject)
        .with_difficulty(difficulty)
    }

    #[test]
    fn test_question_validation() {
        assert!(capital("q1", "geo", Difficulty::Easy).validate().is_ok());
    }

    #[test]
    fn test_question_needs_two_options() {
        let question = Question::new("q1", "Only one?", [("a", "Yes")], "a", "");
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_question_option_limit() {
        let options =
            (0..=limits::MAX_OPTION_COUNT).map(|i| (format!("o{i}"), format!("Option {i}")));
        let question = Question::new("q1", "Too many?", options, "o0", "");
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_correct_option_must_be_listed() {
        let question = Question::new("q1", "Pick", [("a", "A"), ("b", "B")], "z", "");
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_option_ids_must_be_unique() {
        let question = Question::new("q1", "Pick", [("a", "A"), ("a", "Also A")], "a", "");
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_empty_prompt_is_invalid() {
        let question = Question::new("q1", "", [("a", "A"), ("b", "B")], "a", "");
        assert!(question.validate().is_err());
    }

    #[test]
    fn test_correctness_checks() {
        let question = capital("q1", "geo", Difficulty::Easy);
        assert!(question.is_correct(&"a".into()));
        assert!(!question.is_correct(&"b".into()));
        assert!(question.has_option(&"c".into()));
        assert!(!question.has_option(&"d".into()));
    }

    #[test]
    fn test_view_hides_answer() {
        let question = capital("q1", "geo", Difficulty::Easy).with_image("paris.png");
        let json = serde_json::to_string(&question.view()).unwrap();
        assert!(json.contains("paris.png"));
        assert!(!json.contains("correct_option_id"));
        assert!(!json.contains("987"));
    }

    #[test]
    fn test_bank_rejects_duplicates() {
        let result = InMemoryBank::new(vec![
            capital("q1", "geo", Difficulty::Easy),
            capital("q1", "geo", Difficulty::Hard),
        ]);
        assert_eq!(result.unwrap_err(), Error::DuplicateId("q1".into()));
    }

    #[test]
    fn test_bank_rejects_invalid_question() {
        let result = InMemoryBank::new(vec![Question::new("bad", "Pick", [("a", "A")], "a", "")]);
        assert!(matches!(result, Err(Error::Invalid { .. })));
    }

    #[test]
    fn test_bank_filters_and_is_deterministic() {
        let bank = InMemoryBank::new(vec![
            capital("q1", "geo", Difficulty::Easy),
            capital("q2", "history", Difficulty::Easy),
            capital("q3", "geo", Difficulty::Hard),
            capital("q4", "geo", Difficulty::Easy),
        ])
        .unwrap();

        let query = BankQuery {
            subject: Some("geo".to_string()),
            difficulty: Some(Difficulty::Easy),
            count: 2,
        };

        let first = bank.questions(&query).unwrap();
        let second = bank.questions(&query).unwrap();

        assert_eq!(
            first.iter().map(|q| q.id().to_string()).collect_vec(),
            vec!["q1", "q4"]
        );
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first[0], &second[0]));
    }

    #[test]
    fn test_bank_not_enough_questions() {
        let bank = InMemoryBank::new(vec![capital("q1", "geo", Difficulty::Easy)])
            .unwrap();
        assert_eq!(
            bank.questions(&BankQuery::any(3)).unwrap_err(),
            Error::NotEnoughQuestions {
                requested: 3,
                available: 1
            }
        );
    }

    #[test]
    fn test_bank_rejects_zero_count() {
        let bank = InMemoryBank::new(vec![capital("q1", "geo", Difficulty::Easy)])
            .unwrap();
        assert!(matches!(
            bank.questions(&BankQuery::any(0)),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_bank_from_json() {
        let json = r#"[
            {
                "id": "q1",
                "prompt": "2 + 2?",
                "options": [{"id": "a", "text": "3"}, {"id": "b", "text": "4"}],
                "correct_option_id": "b",
                "explanation": "Basic arithmetic.",
                "subject": "math",
                "difficulty": "Easy"
            }
        ]"#;

        let bank = InMemoryBank::from_json(json).unwrap();
        assert_eq!(bank.len(), 1);

        let questions = bank.questions(&BankQuery::any(1)).unwrap();
        assert_eq!(questions[0].correct_option_id(), &OptionId::from("b"));
        assert_eq!(questions[0].subject(), Some("math"));
    }

    #[test]
    fn test_bank_from_malformed_json() {
        assert!(matches!(
            InMemoryBank::from_json("{not json"),
            Err(Error::Malformed(_))
        ));
    }
}
