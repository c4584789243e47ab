// Shared fakes for the headless integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vetted::api::{ApiError, SessionApi};
use vetted::capture::AnswerCapture;
use vetted::controller::SessionController;
use vetted::dictation::{DictationEngine, DictationError, DictationEvent, NoDictation, PhraseSink};
use vetted::model::{
    QuestionDto, QuestionId, SessionDetailsDto, SessionId, SessionStatus, StatusResponse,
    SubmitAnswersRequest,
};

#[derive(Debug)]
pub struct BackendState {
    pub details: SessionDetailsDto,
    pub start_failures: u32,
    pub submit_failures: u32,
    pub submit_conflict: bool,
    pub calls: Vec<&'static str>,
    pub submits: Vec<SubmitAnswersRequest>,
}

/// In-memory backend; clones share state so tests can inspect it after
/// handing one to the controller.
#[derive(Debug, Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<BackendState>>,
}

pub fn details(status: SessionStatus, limits: &[i64]) -> SessionDetailsDto {
    SessionDetailsDto {
        session_id: SessionId::from("sess-1"),
        status,
        title: "Systems engineer screen".into(),
        description: Some("Answer each question before its timer runs out".into()),
        deadline: None,
        questions: limits
            .iter()
            .enumerate()
            .map(|(i, limit)| QuestionDto {
                question_id: QuestionId(format!("q{}", i + 1)),
                text: format!("Question number {}", i + 1),
                max_score: 10.0,
                time_limit_seconds: *limit,
                answer_text: None,
            })
            .collect(),
    }
}

impl FakeBackend {
    pub fn new(details: SessionDetailsDto) -> Self {
        Self {
            state: Arc::new(Mutex::new(BackendState {
                details,
                start_failures: 0,
                submit_failures: 0,
                submit_conflict: false,
                calls: Vec::new(),
                submits: Vec::new(),
            })),
        }
    }

    pub fn with_limits(limits: &[i64]) -> Self {
        Self::new(details(SessionStatus::NotStarted, limits))
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == name).count()
    }

    pub fn submits(&self) -> Vec<SubmitAnswersRequest> {
        self.state().submits.clone()
    }
}

impl SessionApi for FakeBackend {
    fn session_details(&self, _id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        let mut s = self.state();
        s.calls.push("details");
        Ok(s.details.clone())
    }

    fn start_session(&self, _id: &SessionId) -> Result<StatusResponse, ApiError> {
        let mut s = self.state();
        s.calls.push("start");
        if s.start_failures > 0 {
            s.start_failures -= 1;
            return Err(ApiError::Transport("connection refused".into()));
        }
        s.details.status = SessionStatus::InProgress;
        Ok(StatusResponse {
            status: SessionStatus::InProgress,
            message: None,
        })
    }

    fn submit_answers(
        &self,
        _id: &SessionId,
        request: &SubmitAnswersRequest,
    ) -> Result<StatusResponse, ApiError> {
        let mut s = self.state();
        s.calls.push("submit");
        s.submits.push(request.clone());
        if s.submit_conflict {
            return Err(ApiError::Status {
                status: 409,
                message: "session already submitted".into(),
            });
        }
        if s.submit_failures > 0 {
            s.submit_failures -= 1;
            return Err(ApiError::Transport("timed out".into()));
        }
        s.details.status = SessionStatus::Submitted;
        Ok(StatusResponse {
            status: SessionStatus::Submitted,
            message: Some("thanks".into()),
        })
    }

    fn submitted_session(&self, _id: &SessionId) -> Result<SessionDetailsDto, ApiError> {
        let mut s = self.state();
        s.calls.push("submission");
        let mut view = s.details.clone();
        for q in view.questions.iter_mut() {
            q.answer_text = Some(format!("earlier answer to {}", q.question_id));
        }
        Ok(view)
    }
}

/// Dictation engine driven by the test: phrases are pushed through the
/// sink handed to the latest `begin`.
#[derive(Clone, Default)]
pub struct ScriptedDictation {
    sink: Arc<Mutex<Option<PhraseSink>>>,
    /// Language of every successful `begin`, in order
    pub languages: Arc<Mutex<Vec<String>>>,
    pub deny: bool,
}

impl ScriptedDictation {
    /// Refuses every `begin` as if microphone access were denied.
    pub fn denying() -> Self {
        Self {
            deny: true,
            ..Default::default()
        }
    }

    pub fn say(&self, phrase: &str) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            Some(sink) => sink(DictationEvent::Phrase(phrase.to_string())),
            None => false,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }
}

impl DictationEngine for ScriptedDictation {
    fn is_supported(&self) -> bool {
        true
    }

    fn begin(&mut self, language: &str, sink: PhraseSink) -> Result<(), DictationError> {
        if self.deny {
            return Err(DictationError::PermissionDenied("blocked by user".into()));
        }
        self.languages.lock().unwrap().push(language.to_string());
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn cancel(&mut self) {
        self.sink.lock().unwrap().take();
    }
}

pub fn controller(api: FakeBackend) -> SessionController<FakeBackend> {
    let capture = AnswerCapture::new(Box::new(NoDictation), "en-US");
    SessionController::new(api, SessionId::from("sess-1"), capture)
}

pub fn type_text(c: &mut SessionController<FakeBackend>, text: &str) {
    let capture = c.capture_mut().expect("question open for answers");
    for ch in text.chars() {
        capture.insert_char(ch);
    }
}

/// Feeds `n` pulses of the current timer generation.
pub fn pulse(c: &mut SessionController<FakeBackend>, n: u32) {
    for _ in 0..n {
        let generation = c.timer_generation().expect("timer running");
        c.on_timer_pulse(generation).unwrap();
    }
}
