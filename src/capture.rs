use log::{info, warn};
use std::sync::Arc;

use crate::dictation::{DictationEngine, DictationError, DictationEvent};

/// Forwards a dictation event tagged with the run it belongs to.
pub type DictationSink = Arc<dyn Fn(u64, DictationEvent) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum InputMode {
    Text,
    Dictation,
}

/// Where answer text currently comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Text,
    Dictation { run: u64 },
}

impl InputSource {
    pub fn mode(&self) -> InputMode {
        match self {
            InputSource::Text => InputMode::Text,
            InputSource::Dictation { .. } => InputMode::Dictation,
        }
    }
}

/// User-facing warnings raised by the capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureNotice {
    ClipboardBlocked,
    DictationUnsupported,
    DictationDenied(String),
    DictationFailed(String),
}

impl CaptureNotice {
    pub fn message(&self) -> String {
        match self {
            CaptureNotice::ClipboardBlocked => {
                "Copy and paste are disabled during the interview".to_string()
            }
            CaptureNotice::DictationUnsupported => {
                "Dictation is not available; keep typing your answer".to_string()
            }
            CaptureNotice::DictationDenied(why) => {
                format!("Microphone access denied ({}); switched to typing", why)
            }
            CaptureNotice::DictationFailed(why) => {
                format!("Dictation stopped: {}; switched to typing", why)
            }
        }
    }
}

/// Answer buffer for the active question only.
pub struct AnswerCapture {
    buffer: String,
    source: InputSource,
    engine: Box<dyn DictationEngine>,
    sink: Option<DictationSink>,
    language: String,
    next_run: u64,
    notice: Option<CaptureNotice>,
}

impl std::fmt::Debug for AnswerCapture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerCapture")
            .field("buffer", &self.buffer)
            .field("source", &self.source)
            .field("language", &self.language)
            .field("notice", &self.notice)
            .finish()
    }
}

impl AnswerCapture {
    pub fn new(engine: Box<dyn DictationEngine>, language: impl Into<String>) -> Self {
        Self {
            buffer: String::new(),
            source: InputSource::Text,
            engine,
            sink: None,
            language: language.into(),
            next_run: 0,
            notice: None,
        }
    }

    /// Where dictation events should be delivered; usually the app event channel.
    pub fn set_dictation_sink(&mut self, sink: DictationSink) {
        self.sink = Some(sink);
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn mode(&self) -> InputMode {
        self.source.mode()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_dictation_supported(&self) -> bool {
        self.engine.is_supported() && self.sink.is_some()
    }

    pub fn notice(&self) -> Option<&CaptureNotice> {
        self.notice.as_ref()
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    pub fn insert_char(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn newline(&mut self) {
        self.buffer.push('\n');
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    /// Clipboard input is never accepted into the buffer.
    pub fn reject_paste(&mut self, pasted: &str) {
        warn!("blocked paste of {} chars", pasted.chars().count());
        self.notice = Some(CaptureNotice::ClipboardBlocked);
    }

    /// Copy/cut chords on the answer field.
    pub fn reject_clipboard_shortcut(&mut self) {
        warn!("blocked clipboard shortcut");
        self.notice = Some(CaptureNotice::ClipboardBlocked);
    }

    /// The text to submit for the active question.
    pub fn commit(&self) -> String {
        self.buffer.clone()
    }

    /// Clears the buffer and stops dictation, ready for the next question.
    pub fn reset(&mut self) {
        self.stop_dictation();
        self.buffer.clear();
        self.notice = None;
    }

    pub fn switch_mode(&mut self, mode: InputMode) {
        match mode {
            InputMode::Text => self.stop_dictation(),
            InputMode::Dictation => self.start_dictation(),
        }
    }

    pub fn toggle_mode(&mut self) {
        match self.mode() {
            InputMode::Text => self.switch_mode(InputMode::Dictation),
            InputMode::Dictation => self.switch_mode(InputMode::Text),
        }
    }

    /// Changing language restarts an active dictation run.
    pub fn set_language(&mut self, language: impl Into<String>) {
        self.language = language.into();
        if self.mode() == InputMode::Dictation {
            self.stop_dictation();
            self.start_dictation();
        }
    }

    fn start_dictation(&mut self) {
        if self.mode() == InputMode::Dictation {
            return;
        }
        let Some(sink) = self.sink.clone().filter(|_| self.engine.is_supported()) else {
            self.notice = Some(CaptureNotice::DictationUnsupported);
            return;
        };

        let run = self.next_run;
        self.next_run += 1;
        let forward = Box::new(move |ev: DictationEvent| sink(run, ev));
        match self.engine.begin(&self.language, forward) {
            Ok(()) => {
                self.source = InputSource::Dictation { run };
                info!("dictation run {} started", run);
            }
            Err(err) => self.fall_back_to_text(err),
        }
    }

    fn stop_dictation(&mut self) {
        if let InputSource::Dictation { run } = self.source {
            self.engine.cancel();
            self.source = InputSource::Text;
            info!("dictation run {} stopped", run);
        }
    }

    fn fall_back_to_text(&mut self, err: DictationError) {
        warn!("dictation unavailable: {}", err);
        self.engine.cancel();
        self.source = InputSource::Text;
        self.notice = Some(match err {
            DictationError::Unsupported => CaptureNotice::DictationUnsupported,
            DictationError::PermissionDenied(why) => CaptureNotice::DictationDenied(why),
            DictationError::Device(why) => CaptureNotice::DictationFailed(why),
        });
    }

    /// Applies an event from dictation run `run`; events from older runs are dropped.
    pub fn on_dictation(&mut self, run: u64, event: DictationEvent) {
        if self.source != (InputSource::Dictation { run }) {
            return;
        }
        match event {
            DictationEvent::Phrase(phrase) => {
                if !self.buffer.is_empty() && !self.buffer.ends_with(char::is_whitespace) {
                    self.buffer.push(' ');
                }
                self.buffer.push_str(&phrase);
            }
            DictationEvent::Ended => {
                self.source = InputSource::Text;
            }
            DictationEvent::Failed(err) => self.fall_back_to_text(err),
        }
    }
}

impl Drop for AnswerCapture {
    fn drop(&mut self) {
        self.stop_dictation();
    }
}
