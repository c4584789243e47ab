//! Speech-to-text as an optional answer input.
//!
//! Engines report finalized phrases through a sink; the capture decides what to
//! keep. Nothing here retries on its own.

use log::{debug, info, warn};
use std::io::{self, BufRead, BufReader};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;

type ChildSlot = Arc<Mutex<Option<Child>>>;

/// sysexits.h `EX_NOPERM`: the recognizer could not get the microphone
pub const EXIT_NO_PERMISSION: i32 = 77;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DictationError {
    #[error("dictation is not available on this system")]
    Unsupported,
    #[error("microphone access denied: {0}")]
    PermissionDenied(String),
    #[error("dictation device error: {0}")]
    Device(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationEvent {
    /// A finalized phrase, ready to append
    Phrase(String),
    /// The recognizer finished on its own
    Ended,
    Failed(DictationError),
}

pub type PhraseSink = Box<dyn Fn(DictationEvent) -> bool + Send>;

pub trait DictationEngine: Send {
    fn is_supported(&self) -> bool;

    /// Begins capturing in `language`. Events go to `sink` until it returns false
    /// or `cancel` is called.
    fn begin(&mut self, language: &str, sink: PhraseSink) -> Result<(), DictationError>;

    /// Stops capture immediately. Safe to call when idle.
    fn cancel(&mut self);
}

/// The engine used when no recognizer is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDictation;

impl DictationEngine for NoDictation {
    fn is_supported(&self) -> bool {
        false
    }

    fn begin(&mut self, _language: &str, _sink: PhraseSink) -> Result<(), DictationError> {
        Err(DictationError::Unsupported)
    }

    fn cancel(&mut self) {}
}

/// Runs an external recognizer and reads one finalized phrase per stdout line.
///
/// The language is passed as `--language <tag>` after the configured arguments.
/// On unix the recognizer leads its own process group, and cancel stops the
/// whole group, so helpers started by a wrapper script go with it.
#[derive(Debug)]
pub struct CommandDictation {
    program: String,
    args: Vec<String>,
    /// Slot of the current run. Each run gets a fresh one, and its reader
    /// thread only ever reaps the child in its own slot.
    running: Option<ChildSlot>,
}

impl CommandDictation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            running: None,
        }
    }

    /// Splits a shell-like command line on whitespace.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

fn spawn_error(err: io::Error) -> DictationError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => DictationError::PermissionDenied(err.to_string()),
        io::ErrorKind::NotFound => DictationError::Unsupported,
        _ => DictationError::Device(err.to_string()),
    }
}

fn kill_recognizer(child: &mut Child) {
    #[cfg(unix)]
    {
        // Negative pid: signal the process group the child leads.
        let pgid = -(child.id() as libc::pid_t);
        if unsafe { libc::kill(pgid, libc::SIGKILL) } == 0 {
            return;
        }
    }
    if let Err(e) = child.kill() {
        warn!("could not stop recognizer: {}", e);
    }
}

fn exit_event(status: ExitStatus) -> DictationEvent {
    match status.code() {
        Some(0) => DictationEvent::Ended,
        Some(EXIT_NO_PERMISSION) => DictationEvent::Failed(DictationError::PermissionDenied(
            "recognizer reported no microphone permission".to_string(),
        )),
        Some(code) => DictationEvent::Failed(DictationError::Device(format!(
            "recognizer exited with status {}",
            code
        ))),
        // Killed by a signal; only cancel does that, so stay quiet.
        None => DictationEvent::Ended,
    }
}

impl DictationEngine for CommandDictation {
    fn is_supported(&self) -> bool {
        !self.program.is_empty()
    }

    fn begin(&mut self, language: &str, sink: PhraseSink) -> Result<(), DictationError> {
        self.cancel();

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--language")
            .arg(language)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command.spawn().map_err(spawn_error)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DictationError::Device("recognizer has no stdout".to_string()))?;
        info!("dictation started: {} ({})", self.program, language);

        let own: ChildSlot = Arc::new(Mutex::new(Some(child)));
        let slot = Arc::clone(&own);
        self.running = Some(own);

        thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                let phrase = line.trim();
                if phrase.is_empty() {
                    continue;
                }
                if !sink(DictationEvent::Phrase(phrase.to_string())) {
                    return;
                }
            }

            // stdout closed: reap this run's child unless cancel already did.
            loop {
                let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
                let Some(child) = guard.as_mut() else {
                    return;
                };
                match child.try_wait() {
                    Ok(Some(status)) => {
                        guard.take();
                        drop(guard);
                        debug!("recognizer exited: {:?}", status);
                        sink(exit_event(status));
                        return;
                    }
                    Ok(None) => {}
                    Err(e) => {
                        guard.take();
                        drop(guard);
                        sink(DictationEvent::Failed(DictationError::Device(e.to_string())));
                        return;
                    }
                }
                drop(guard);
                thread::sleep(Duration::from_millis(20));
            }
        });

        Ok(())
    }

    fn cancel(&mut self) {
        let Some(slot) = self.running.take() else {
            return;
        };
        let taken = slot.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(mut child) = taken {
            kill_recognizer(&mut child);
            let _ = child.wait();
            info!("dictation stopped");
        }
    }
}

impl Drop for CommandDictation {
    fn drop(&mut self) {
        self.cancel();
    }
}
