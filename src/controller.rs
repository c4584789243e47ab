use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{ApiError, SessionApi};
use crate::capture::AnswerCapture;
use crate::dictation::DictationEvent;
use crate::error::{Result, SessionError};
use crate::gate::{self, LeaveDecision, LeaveGuard};
use crate::model::{
    Answer, AnswerPayload, InterviewSession, Question, SessionId, SubmitAnswersRequest,
    SubmittedView,
};
use crate::sequencer::QuestionSequencer;
use crate::timer::{CountdownTimer, TimerEvent};

/// Schedules a timer pulse for the given generation; false once nobody listens.
pub type PulseEmitter = Arc<dyn Fn(u64) -> bool + Send + Sync>;

pub const PULSE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum SessionPhase {
    Loading,
    NotStarted,
    InProgress,
    Completed,
    /// Closed server-side before this client touched it; read-only.
    AlreadySubmitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Advanced { index: usize },
    Completed,
}

/// Client-side progress through a running session. Only the controller writes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionRuntimeState {
    current_index: usize,
    elapsed: u32,
    answers: Vec<Option<Answer>>,
}

impl SessionRuntimeState {
    fn new(question_count: usize) -> Self {
        Self {
            current_index: 0,
            elapsed: 0,
            answers: vec![None; question_count],
        }
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn answer(&self, index: usize) -> Option<&Answer> {
        self.answers.get(index).and_then(Option::as_ref)
    }

    pub fn recorded(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    fn record(&mut self, index: usize, answer: Answer) {
        if let Some(slot) = self.answers.get_mut(index) {
            *slot = Some(answer);
        }
    }

    fn move_to(&mut self, index: usize) {
        debug_assert!(index >= self.current_index);
        self.current_index = index;
        self.elapsed = 0;
    }

    /// All answers in question order, if every slot is filled.
    fn ordered(&self) -> Option<Vec<Answer>> {
        self.answers.iter().cloned().collect()
    }
}

/// Drives one candidate through one interview session.
pub struct SessionController<A: SessionApi> {
    api: A,
    session_id: SessionId,
    phase: SessionPhase,
    session: Option<InterviewSession>,
    sequencer: QuestionSequencer,
    timer: Option<CountdownTimer>,
    capture: AnswerCapture,
    runtime: SessionRuntimeState,
    guard: LeaveGuard,
    staged: Option<Vec<Answer>>,
    submitted_view: Option<SubmittedView>,
    last_error: Option<String>,
    pulses: Option<(Duration, PulseEmitter)>,
}

impl<A: SessionApi> SessionController<A> {
    pub fn new(api: A, session_id: SessionId, capture: AnswerCapture) -> Self {
        Self {
            api,
            session_id,
            phase: SessionPhase::Loading,
            session: None,
            sequencer: QuestionSequencer::new(Vec::new()),
            timer: None,
            capture,
            runtime: SessionRuntimeState::default(),
            guard: LeaveGuard::default(),
            staged: None,
            submitted_view: None,
            last_error: None,
            pulses: None,
        }
    }

    /// Schedules timer pulses through `emit`. Without it the owner must feed
    /// `on_timer_pulse` by hand.
    pub fn with_pulses(mut self, interval: Duration, emit: PulseEmitter) -> Self {
        self.pulses = Some((interval, emit));
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn session(&self) -> Option<&InterviewSession> {
        self.session.as_ref()
    }

    pub fn submitted_view(&self) -> Option<&SubmittedView> {
        self.submitted_view.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.phase {
            SessionPhase::InProgress => self.sequencer.current(),
            _ => None,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_question().map(|q| q.ordinal)
    }

    pub fn question_count(&self) -> usize {
        self.sequencer.len()
    }

    pub fn is_last_question(&self) -> bool {
        self.sequencer.is_last_question()
    }

    pub fn runtime(&self) -> &SessionRuntimeState {
        &self.runtime
    }

    pub fn remaining_seconds(&self) -> Option<u32> {
        self.timer
            .as_ref()
            .filter(|_| self.phase == SessionPhase::InProgress)
            .map(CountdownTimer::remaining)
    }

    pub fn timer_generation(&self) -> Option<u64> {
        self.timer.as_ref().map(CountdownTimer::generation)
    }

    /// The batch held back after a failed finalize, waiting for a retry.
    pub fn staged_answers(&self) -> Option<&[Answer]> {
        self.staged.as_deref()
    }

    pub fn is_finalize_pending(&self) -> bool {
        self.staged.is_some()
    }

    pub fn capture(&self) -> &AnswerCapture {
        &self.capture
    }

    /// Editable only while a question is open for answers.
    pub fn capture_mut(&mut self) -> Option<&mut AnswerCapture> {
        if self.phase == SessionPhase::InProgress && self.staged.is_none() {
            Some(&mut self.capture)
        } else {
            None
        }
    }

    pub fn guard(&self) -> &LeaveGuard {
        &self.guard
    }

    pub fn request_leave(&mut self) -> LeaveDecision {
        self.guard.request_leave()
    }

    pub fn confirm_leave(&mut self) -> LeaveDecision {
        self.guard.confirm_leave()
    }

    pub fn cancel_leave(&mut self) {
        self.guard.cancel_leave()
    }

    pub fn load_session_details(&mut self) -> Result<SessionPhase> {
        self.load_session_details_at(Utc::now())
    }

    /// Fetches and validates the session, then decides between the start
    /// screen and the read-only notice.
    pub fn load_session_details_at(&mut self, now: DateTime<Utc>) -> Result<SessionPhase> {
        if !matches!(
            self.phase,
            SessionPhase::Loading | SessionPhase::NotStarted
        ) {
            return Err(SessionError::InvalidPhase {
                action: "load",
                phase: self.phase,
            });
        }

        let dto = self.api.session_details(&self.session_id).map_err(|e| {
            error!("loading session {} failed: {}", self.session_id, e);
            self.last_error = Some(e.to_string());
            SessionError::from(e)
        })?;

        let session = InterviewSession::try_from(dto).map_err(|e| {
            error!("session {} rejected: {}", self.session_id, e);
            self.last_error = Some(e.to_string());
            e
        })?;

        self.last_error = None;
        let gate_result = gate::check_entry(&session, now);
        self.sequencer = QuestionSequencer::new(session.questions.clone());
        self.runtime = SessionRuntimeState::new(session.questions.len());

        match gate_result {
            Ok(()) => {
                info!(
                    "session {} loaded: {} questions",
                    session.id,
                    session.questions.len()
                );
                self.session = Some(session);
                self.phase = SessionPhase::NotStarted;
            }
            Err(_) => {
                self.submitted_view = Some(self.fetch_submitted_view(&session));
                self.session = Some(session);
                self.enter_already_submitted();
            }
        }

        Ok(self.phase)
    }

    fn fetch_submitted_view(&self, session: &InterviewSession) -> SubmittedView {
        match self.api.submitted_session(&self.session_id) {
            Ok(dto) => SubmittedView::from(dto),
            Err(e) => {
                warn!("submitted view unavailable: {}", e);
                SubmittedView {
                    title: session.title.clone(),
                    status: session.status,
                    entries: session
                        .questions
                        .iter()
                        .map(|q| (q.text.clone(), None))
                        .collect(),
                }
            }
        }
    }

    fn enter_already_submitted(&mut self) {
        self.phase = SessionPhase::AlreadySubmitted;
        self.stop_timer();
        self.capture.reset();
        self.guard.disarm();
        info!("session {} is read-only", self.session_id);
    }

    pub fn start_session(&mut self) -> Result<()> {
        match self.phase {
            SessionPhase::NotStarted => {}
            SessionPhase::AlreadySubmitted => {
                return Err(SessionError::TerminalState(self.session_id.to_string()))
            }
            phase => {
                return Err(SessionError::InvalidPhase {
                    action: "start",
                    phase,
                })
            }
        }

        let resp = match self.api.start_session(&self.session_id) {
            Ok(resp) => resp,
            Err(e) => return Err(self.lifecycle_failure("start", e)),
        };

        if resp.status.is_terminal() {
            warn!("backend reports session {} as {}", self.session_id, resp.status);
            if let Some(session) = self.session.as_mut() {
                session.status = resp.status;
            }
            self.enter_already_submitted();
            return Err(SessionError::TerminalState(self.session_id.to_string()));
        }

        let first = self
            .sequencer
            .begin()
            .cloned()
            .ok_or_else(|| SessionError::Configuration("session has no questions".into()))?;

        if let Some(session) = self.session.as_mut() {
            session.status = resp.status;
        }
        self.last_error = None;
        self.phase = SessionPhase::InProgress;
        self.runtime.move_to(0);
        self.capture.reset();
        self.timer = Some(CountdownTimer::new(first.time_limit));
        self.run_timer();
        self.guard.arm();
        info!("session {} started", self.session_id);
        Ok(())
    }

    /// Single entry point for manual and timer-driven submission.
    pub fn submit_answer(&mut self, index: usize, trigger: SubmitTrigger) -> Result<SubmitOutcome> {
        if self.phase != SessionPhase::InProgress {
            return Err(SessionError::InvalidPhase {
                action: "submit",
                phase: self.phase,
            });
        }

        let current = self.runtime.current_index();
        if index != current {
            warn!(
                "{:?} submit for question {} rejected; question {} is active",
                trigger, index, current
            );
            return Err(SessionError::StaleSubmit {
                submitted: index,
                current,
            });
        }

        if self.staged.is_some() {
            // The final answer is already in; only the upload is outstanding.
            return self.retry_finalize();
        }

        let question = self
            .sequencer
            .current()
            .cloned()
            .ok_or(crate::sequencer::SequenceError::NotStarted)?;

        let elapsed = match trigger {
            SubmitTrigger::Manual => self.runtime.elapsed().min(question.time_limit.get()),
            SubmitTrigger::Timeout => question.time_limit.get(),
        };
        let answer = Answer {
            question_id: question.id.clone(),
            text: self.capture.commit(),
            elapsed_seconds: elapsed,
        };
        info!(
            "answer {} recorded ({:?}, {}s, {} chars)",
            index,
            trigger,
            elapsed,
            answer.text.chars().count()
        );
        self.runtime.record(index, answer);

        if self.sequencer.is_last_question() {
            self.stop_timer();
            self.capture.reset();
            let batch = self.runtime.ordered().ok_or_else(|| {
                SessionError::Configuration("an earlier answer is missing".into())
            })?;
            self.staged = Some(batch);
            return self.finalize();
        }

        let next = self.sequencer.advance()?.clone();
        self.runtime.move_to(next.ordinal);
        self.capture.reset();
        if let Some(timer) = self.timer.as_mut() {
            timer.reset(next.time_limit);
        }
        self.run_timer();
        Ok(SubmitOutcome::Advanced {
            index: next.ordinal,
        })
    }

    /// Re-sends the staged batch after a failed finalize.
    pub fn retry_finalize(&mut self) -> Result<SubmitOutcome> {
        if self.phase != SessionPhase::InProgress || self.staged.is_none() {
            return Err(SessionError::InvalidPhase {
                action: "retry submission",
                phase: self.phase,
            });
        }
        info!("retrying final submission for {}", self.session_id);
        self.finalize()
    }

    fn finalize(&mut self) -> Result<SubmitOutcome> {
        let request = SubmitAnswersRequest {
            answers: self
                .staged
                .iter()
                .flatten()
                .map(AnswerPayload::from)
                .collect(),
        };

        match self.api.submit_answers(&self.session_id, &request) {
            Ok(resp) => {
                self.staged = None;
                self.last_error = None;
                self.phase = SessionPhase::Completed;
                if let Some(session) = self.session.as_mut() {
                    session.status = resp.status;
                }
                self.guard.disarm();
                info!(
                    "session {} submitted with {} answers",
                    self.session_id,
                    request.answers.len()
                );
                Ok(SubmitOutcome::Completed)
            }
            Err(ApiError::Status { status: 409, message }) => {
                error!("session {} closed server-side: {}", self.session_id, message);
                self.last_error = Some(message);
                self.staged = None;
                self.submitted_view = self
                    .session
                    .as_ref()
                    .map(|s| self.fetch_submitted_view(s));
                self.enter_already_submitted();
                Err(SessionError::TerminalState(self.session_id.to_string()))
            }
            Err(e) => Err(self.lifecycle_failure("submit", e)),
        }
    }

    fn lifecycle_failure(&mut self, action: &str, err: ApiError) -> SessionError {
        error!("{} failed for {}: {}", action, self.session_id, err);
        self.last_error = Some(err.to_string());
        SessionError::Network(err)
    }

    /// Feeds a metronome pulse; expiry auto-submits the active question.
    pub fn on_timer_pulse(&mut self, generation: u64) -> Result<Option<SubmitOutcome>> {
        let events = match self.timer.as_mut() {
            Some(timer) if self.phase == SessionPhase::InProgress => timer.on_pulse(generation),
            _ => return Ok(None),
        };

        let mut outcome = None;
        for event in events {
            match event {
                TimerEvent::Tick { elapsed } => self.runtime.elapsed = elapsed,
                TimerEvent::Expired => {
                    let index = self.runtime.current_index();
                    info!("time is up on question {}", index);
                    outcome = Some(self.submit_answer(index, SubmitTrigger::Timeout)?);
                }
            }
        }
        Ok(outcome)
    }

    pub fn on_dictation(&mut self, run: u64, event: DictationEvent) {
        if self.phase == SessionPhase::InProgress {
            self.capture.on_dictation(run, event);
        }
    }

    fn run_timer(&mut self) {
        let Some(timer) = self.timer.as_mut() else {
            return;
        };
        match &self.pulses {
            Some((interval, emit)) => {
                let emit = Arc::clone(emit);
                timer.start(*interval, move |g| emit(g));
            }
            None => timer.arm(),
        }
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
    }
}

impl<A: SessionApi> Drop for SessionController<A> {
    fn drop(&mut self) {
        self.stop_timer();
        self.guard.disarm();
    }
}
