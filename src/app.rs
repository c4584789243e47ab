use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, warn};

use crate::api::SessionApi;
use crate::controller::{SessionController, SessionPhase, SubmitOutcome, SubmitTrigger};
use crate::error::SessionError;
use crate::gate::LeaveDecision;
use crate::runtime::AppEvent;

/// Terminal front end state around one session controller
pub struct App<A: SessionApi> {
    pub controller: SessionController<A>,
    pub should_quit: bool,
    /// One-line status shown under the current screen
    pub flash: Option<String>,
    /// Dictation languages f3 switches between
    languages: Vec<String>,
}

fn is_clipboard_chord(key: &KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    match key.code {
        KeyCode::Char(c) if ctrl => matches!(c.to_ascii_lowercase(), 'c' | 'v' | 'x'),
        KeyCode::Insert => ctrl || shift,
        _ => false,
    }
}

impl<A: SessionApi> App<A> {
    pub fn new(controller: SessionController<A>) -> Self {
        let languages = vec![controller.capture().language().to_string()];
        Self {
            controller,
            should_quit: false,
            flash: None,
            languages,
        }
    }

    pub fn with_languages(mut self, languages: Vec<String>) -> Self {
        if !languages.is_empty() {
            self.languages = languages;
        }
        self
    }

    pub fn can_switch_language(&self) -> bool {
        self.languages.len() > 1
    }

    pub fn phase(&self) -> SessionPhase {
        self.controller.phase()
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Key(key) => {
                if key.kind != KeyEventKind::Release {
                    self.handle_key(key);
                }
            }
            AppEvent::Paste(text) => {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.reject_paste(&text);
                }
            }
            AppEvent::TimerPulse(generation) => {
                let result = self.controller.on_timer_pulse(generation);
                self.report(result);
            }
            AppEvent::Dictation { run, event } => self.controller.on_dictation(run, event),
            AppEvent::Resize | AppEvent::Tick => {}
        }
    }

    fn report(&mut self, result: Result<Option<SubmitOutcome>, SessionError>) {
        match result {
            Ok(Some(SubmitOutcome::Advanced { index })) => {
                self.flash = Some(format!(
                    "Moved on to question {} of {}",
                    index + 1,
                    self.controller.question_count()
                ));
            }
            Ok(Some(SubmitOutcome::Completed)) | Ok(None) => {}
            // Lifecycle failures are kept on the controller and rendered with a retry hint.
            Err(SessionError::Network(_)) | Err(SessionError::TerminalState(_)) => {}
            Err(e) => {
                warn!("{}", e);
                self.flash = Some(e.to_string());
            }
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        debug!("key {:?} in {}", key.code, self.phase());

        if self.controller.guard().is_awaiting_confirmation() {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    if self.controller.confirm_leave() == LeaveDecision::Leave {
                        self.should_quit = true;
                    }
                }
                _ => self.controller.cancel_leave(),
            }
            return;
        }

        match self.phase() {
            SessionPhase::Loading => match key.code {
                KeyCode::Char('r') => {
                    if let Err(e) = self.controller.load_session_details() {
                        self.flash = Some(e.to_string());
                    }
                }
                KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.should_quit = true
                }
                _ => {}
            },
            SessionPhase::NotStarted => match key.code {
                KeyCode::Enter | KeyCode::Char('s') => {
                    self.flash = None;
                    if let Err(e) = self.controller.start_session() {
                        if !matches!(e, SessionError::Network(_)) {
                            self.flash = Some(e.to_string());
                        }
                    }
                }
                KeyCode::Esc | KeyCode::Char('q') => self.request_leave(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.request_leave()
                }
                _ => {}
            },
            SessionPhase::InProgress => self.handle_answer_key(key),
            SessionPhase::Completed | SessionPhase::AlreadySubmitted => match key.code {
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.request_leave(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.request_leave()
                }
                _ => {}
            },
        }
    }

    fn request_leave(&mut self) {
        if self.controller.request_leave() == LeaveDecision::Leave {
            self.should_quit = true;
        }
    }

    fn next_language(&mut self) {
        if !self.can_switch_language() {
            return;
        }
        let Some(capture) = self.controller.capture_mut() else {
            return;
        };
        let next = self
            .languages
            .iter()
            .position(|l| l == capture.language())
            .map_or(0, |i| (i + 1) % self.languages.len());
        let language = self.languages[next].clone();
        capture.set_language(language.clone());
        self.flash = Some(format!("Dictation language: {}", language));
    }

    fn handle_answer_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Esc {
            self.request_leave();
            return;
        }

        if self.controller.is_finalize_pending() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char('r')) {
                let result = self.controller.retry_finalize().map(Some);
                self.report(result);
            }
            return;
        }

        if is_clipboard_chord(&key) {
            if let Some(capture) = self.controller.capture_mut() {
                capture.reject_clipboard_shortcut();
            }
            return;
        }

        match key.code {
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.newline();
                }
            }
            KeyCode::Enter => {
                if let Some(index) = self.controller.current_index() {
                    let result = self
                        .controller
                        .submit_answer(index, SubmitTrigger::Manual)
                        .map(Some);
                    self.report(result);
                }
            }
            KeyCode::F(2) => {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.toggle_mode();
                }
            }
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.toggle_mode();
                }
            }
            KeyCode::F(3) => self.next_language(),
            KeyCode::Backspace => {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.backspace();
                    capture.clear_notice();
                }
            }
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                if let Some(capture) = self.controller.capture_mut() {
                    capture.insert_char(c);
                    capture.clear_notice();
                }
            }
            _ => {}
        }
    }
}
