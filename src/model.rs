use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

use crate::error::SessionError;

/// Opaque identifier of one assigned interview instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Submitted,
    TimedOut,
}

impl SessionStatus {
    /// Submitted and timed-out sessions accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub max_score: f64,
    pub time_limit: NonZeroU32,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InterviewSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub questions: Vec<Question>,
}

impl InterviewSession {
    pub fn is_past_deadline(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub question_id: QuestionId,
    pub text: String,
    pub elapsed_seconds: u32,
}

impl From<&Answer> for AnswerPayload {
    fn from(a: &Answer) -> Self {
        Self {
            question_id: a.question_id.clone(),
            answer_text: a.text.clone(),
            elapsed_seconds: a.elapsed_seconds,
        }
    }
}

// Wire shapes

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDto {
    pub question_id: QuestionId,
    pub text: String,
    pub max_score: f64,
    pub time_limit_seconds: i64,
    /// Present only on the submitted view.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetailsDto {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPayload {
    pub question_id: QuestionId,
    pub answer_text: String,
    pub elapsed_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitAnswersRequest {
    pub answers: Vec<AnswerPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: SessionStatus,
    #[serde(default)]
    pub message: Option<String>,
}

impl TryFrom<SessionDetailsDto> for InterviewSession {
    type Error = SessionError;

    fn try_from(dto: SessionDetailsDto) -> Result<Self, Self::Error> {
        if dto.questions.is_empty() && !dto.status.is_terminal() {
            return Err(SessionError::Configuration(format!(
                "session {} has no questions",
                dto.session_id
            )));
        }

        if let Some(dup) = dto
            .questions
            .iter()
            .map(|q| &q.question_id)
            .duplicates()
            .next()
        {
            return Err(SessionError::Configuration(format!(
                "question {} appears more than once",
                dup
            )));
        }

        let questions = dto
            .questions
            .into_iter()
            .enumerate()
            .map(|(ordinal, q)| {
                let time_limit = u32::try_from(q.time_limit_seconds)
                    .ok()
                    .and_then(NonZeroU32::new)
                    .ok_or_else(|| {
                        SessionError::Configuration(format!(
                            "question {} has non-positive time limit {}",
                            q.question_id, q.time_limit_seconds
                        ))
                    })?;
                if !(q.max_score > 0.0) {
                    return Err(SessionError::Configuration(format!(
                        "question {} has non-positive max score {}",
                        q.question_id, q.max_score
                    )));
                }
                Ok(Question {
                    id: q.question_id,
                    text: q.text,
                    max_score: q.max_score,
                    time_limit,
                    ordinal,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InterviewSession {
            id: dto.session_id,
            status: dto.status,
            title: dto.title,
            description: dto.description,
            deadline: dto.deadline,
            questions,
        })
    }
}

/// A read-only view of a closed session, as shown behind the gate.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedView {
    pub title: String,
    pub status: SessionStatus,
    pub entries: Vec<(String, Option<String>)>,
}

impl From<SessionDetailsDto> for SubmittedView {
    fn from(dto: SessionDetailsDto) -> Self {
        Self {
            title: dto.title,
            status: dto.status,
            entries: dto
                .questions
                .into_iter()
                .map(|q| (q.text, q.answer_text))
                .collect(),
        }
    }
}
