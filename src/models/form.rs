use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    client::{Form, Submission},
    result::Result,
    session::Session,
};

/// Answers to a forum questionnaire, keyed by question id.
///
/// ```
/// # use arzforum::models::form::FormAnswers;
/// let answers = FormAnswers::new().answer(531, "1").answer(532, "Nick_Stone");
/// assert_eq!(answers.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormAnswers {
    answers: BTreeMap<u64, String>,
}

impl FormAnswers {
    /// Creates an empty answer sheet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the answer to `question_id`, replacing an earlier one.
    pub fn answer(mut self, question_id: u64, value: impl Into<String>) -> Self {
        self.answers.insert(question_id, value.into());
        self
    }

    /// Returns the number of answered questions.
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    /// Whether no question has been answered.
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Submits the answers to questionnaire `form_id`.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn submit(&self, session: &Session, form_id: u64) -> Result<Submission> {
        session
            .submit(&format!("/form/{form_id}/submit"), self.to_form())
            .await
    }

    fn to_form(&self) -> Form {
        self.answers
            .iter()
            .fold(Form::new(), |form, (question, value)| {
                form.field(format!("question[{question}]"), value)
            })
    }
}
