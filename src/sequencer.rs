use log::warn;
use thiserror::Error;

use crate::model::Question;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("session has not started")]
    NotStarted,
    #[error("already at the last question ({0})")]
    AtTerminal(usize),
}

/// Walks a fixed question list front to back, with no way back.
#[derive(Debug, Clone)]
pub struct QuestionSequencer {
    questions: Vec<Question>,
    index: Option<usize>,
}

impl QuestionSequencer {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            questions,
            index: None,
        }
    }

    /// Exposes the first question. Calling it again is a no-op.
    pub fn begin(&mut self) -> Option<&Question> {
        if self.index.is_none() && !self.questions.is_empty() {
            self.index = Some(0);
        }
        self.current()
    }

    pub fn current(&self) -> Option<&Question> {
        self.index.and_then(|i| self.questions.get(i))
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn is_last_question(&self) -> bool {
        self.index
            .is_some_and(|i| i + 1 == self.questions.len())
    }

    /// Moves to the next question. Fails without moving at the terminal question.
    pub fn advance(&mut self) -> Result<&Question, SequenceError> {
        let idx = self.index.ok_or(SequenceError::NotStarted)?;
        if idx + 1 >= self.questions.len() {
            warn!("advance requested at terminal question {}", idx);
            return Err(SequenceError::AtTerminal(idx));
        }
        self.index = Some(idx + 1);
        Ok(&self.questions[idx + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionId;
    use std::num::NonZeroU32;

    fn questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                id: QuestionId(format!("q{}", i)),
                text: format!("question {}", i),
                max_score: 10.0,
                time_limit: NonZeroU32::new(30).unwrap(),
                ordinal: i,
            })
            .collect()
    }

    #[test]
    fn no_current_before_begin() {
        let seq = QuestionSequencer::new(questions(3));
        assert!(seq.current().is_none());
        assert_eq!(seq.index(), None);
        assert!(!seq.is_last_question());
    }

    #[test]
    fn begin_is_idempotent() {
        let mut seq = QuestionSequencer::new(questions(3));
        assert_eq!(seq.begin().unwrap().ordinal, 0);
        seq.advance().unwrap();
        assert_eq!(seq.begin().unwrap().ordinal, 1);
    }

    #[test]
    fn advance_before_begin_fails() {
        let mut seq = QuestionSequencer::new(questions(2));
        assert_eq!(seq.advance().unwrap_err(), SequenceError::NotStarted);
    }

    #[test]
    fn advances_one_step_at_a_time_until_terminal() {
        let mut seq = QuestionSequencer::new(questions(3));
        seq.begin();
        let mut seen = vec![seq.index().unwrap()];
        while !seq.is_last_question() {
            seq.advance().unwrap();
            seen.push(seq.index().unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2]);

        assert_eq!(seq.advance().unwrap_err(), SequenceError::AtTerminal(2));
        assert_eq!(seq.index(), Some(2));
    }

    #[test]
    fn single_question_is_immediately_terminal() {
        let mut seq = QuestionSequencer::new(questions(1));
        seq.begin();
        assert!(seq.is_last_question());
        assert!(seq.advance().is_err());
    }
}
