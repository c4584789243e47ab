use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

mod common;
use common::{FakeBackend, ScriptedDictation};

use vetted::app::App;
use vetted::capture::{AnswerCapture, CaptureNotice, InputMode};
use vetted::controller::{SessionController, SessionPhase};
use vetted::dictation::NoDictation;
use vetted::model::SessionId;
use vetted::runtime::{self, AppEvent, FixedTicker, Runner, TestEventSource};

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

fn chord(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL))
}

fn typed(text: &str) -> Vec<AppEvent> {
    text.chars().map(|c| key(KeyCode::Char(c))).collect()
}

fn app(api: FakeBackend) -> App<FakeBackend> {
    let capture = AnswerCapture::new(Box::new(NoDictation), "en-US");
    let mut controller = SessionController::new(api, SessionId::from("sess-1"), capture);
    controller.load_session_details().unwrap();
    App::new(controller)
}

/// Drives the app until the channel runs dry (first Tick) or it quits.
fn drain<T: runtime::Ticker>(app: &mut App<FakeBackend>, runner: &Runner<TestEventSource, T>) {
    for _ in 0..1000u32 {
        match runner.step() {
            AppEvent::Tick => break,
            event => app.handle_event(event),
        }
        if app.should_quit {
            break;
        }
    }
}

// Keyboard-only walk through a two-question session; timer pulses are
// posted by hand so the run is deterministic.
#[test]
fn headless_session_flow_completes() {
    let api = FakeBackend::with_limits(&[30, 30]);
    let mut app = app(api.clone());

    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    drain(&mut app, &runner);
    assert_eq!(app.phase(), SessionPhase::InProgress);

    let generation = app.controller.timer_generation().unwrap();
    for ev in typed("heap") {
        tx.send(ev).unwrap();
    }
    tx.send(AppEvent::TimerPulse(generation)).unwrap();
    tx.send(AppEvent::TimerPulse(generation)).unwrap();
    tx.send(key(KeyCode::Backspace)).unwrap();
    tx.send(key(KeyCode::Enter)).unwrap();
    drain(&mut app, &runner);

    assert_eq!(app.controller.current_index(), Some(1));
    let first = app.controller.runtime().answer(0).unwrap();
    assert_eq!(first.text, "hea");
    assert_eq!(first.elapsed_seconds, 2);
    assert_eq!(app.flash.as_deref(), Some("Moved on to question 2 of 2"));

    for ev in typed("stack") {
        tx.send(ev).unwrap();
    }
    tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::ALT)))
        .unwrap();
    for ev in typed("frames") {
        tx.send(ev).unwrap();
    }
    tx.send(key(KeyCode::Enter)).unwrap();
    drain(&mut app, &runner);

    assert_eq!(app.phase(), SessionPhase::Completed);
    let sent = api.submits();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].answers[1].answer_text, "stack\nframes");

    // Nothing left to protect; leaving is immediate.
    tx.send(key(KeyCode::Esc)).unwrap();
    drain(&mut app, &runner);
    assert!(app.should_quit);
}

#[test]
fn paste_and_clipboard_chords_never_reach_the_buffer() {
    let mut app = app(FakeBackend::with_limits(&[30]));
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    for ev in typed("own") {
        tx.send(ev).unwrap();
    }
    tx.send(AppEvent::Paste("pasted answer".into())).unwrap();
    tx.send(chord('v')).unwrap();
    tx.send(AppEvent::Key(KeyEvent::new(KeyCode::Insert, KeyModifiers::SHIFT)))
        .unwrap();
    drain(&mut app, &runner);

    let capture = app.controller.capture();
    assert_eq!(capture.text(), "own");
    assert_eq!(capture.notice(), Some(&CaptureNotice::ClipboardBlocked));

    // Typing again clears the warning.
    tx.send(key(KeyCode::Char('s'))).unwrap();
    drain(&mut app, &runner);
    assert_eq!(app.controller.capture().text(), "owns");
    assert!(app.controller.capture().notice().is_none());
}

#[test]
fn leaving_mid_session_needs_confirmation() {
    let mut app = app(FakeBackend::with_limits(&[30]));
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::Esc)).unwrap();
    drain(&mut app, &runner);
    assert!(!app.should_quit);
    assert!(app.controller.guard().is_awaiting_confirmation());

    // Any key other than y stays, and is not typed into the answer.
    tx.send(key(KeyCode::Char('n'))).unwrap();
    drain(&mut app, &runner);
    assert!(!app.should_quit);
    assert_eq!(app.controller.capture().text(), "");

    tx.send(key(KeyCode::Esc)).unwrap();
    tx.send(key(KeyCode::Char('y'))).unwrap();
    drain(&mut app, &runner);
    assert!(app.should_quit);
    assert!(!app.controller.guard().is_armed());
}

#[test]
fn failed_upload_is_retried_from_the_keyboard() {
    let api = FakeBackend::with_limits(&[30]);
    api.state().submit_failures = 1;
    let mut app = app(api.clone());
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    for ev in typed("done") {
        tx.send(ev).unwrap();
    }
    tx.send(key(KeyCode::Enter)).unwrap();
    drain(&mut app, &runner);
    assert_eq!(app.phase(), SessionPhase::InProgress);
    assert!(app.controller.is_finalize_pending());

    // Edits are refused while the upload is outstanding.
    tx.send(key(KeyCode::Char('x'))).unwrap();
    tx.send(key(KeyCode::Char('r'))).unwrap();
    drain(&mut app, &runner);

    assert_eq!(app.phase(), SessionPhase::Completed);
    let sent = api.submits();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].answers[0].answer_text, "done");
}

// Real metronome at a short interval: the unattended question submits
// itself and the session completes.
#[test]
fn metronome_pulses_drive_auto_submit() {
    let api = FakeBackend::with_limits(&[2, 1]);
    let (tx, rx) = mpsc::channel();
    let capture = AnswerCapture::new(Box::new(NoDictation), "en-US");
    let mut controller = SessionController::new(api.clone(), SessionId::from("sess-1"), capture)
        .with_pulses(Duration::from_millis(5), runtime::pulse_emitter(tx.clone()));
    controller.load_session_details().unwrap();
    let mut app = App::new(controller);
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(20)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while app.phase() != SessionPhase::Completed && Instant::now() < deadline {
        let event = runner.step();
        app.handle_event(event);
    }

    assert_eq!(app.phase(), SessionPhase::Completed);
    let sent = api.submits();
    assert_eq!(sent.len(), 1);
    let elapsed: Vec<_> = sent[0].answers.iter().map(|a| a.elapsed_seconds).collect();
    assert_eq!(elapsed, [2, 1]);
    assert!(sent[0].answers.iter().all(|a| a.answer_text.is_empty()));
}

#[test]
fn f3_switches_dictation_language_mid_answer() {
    let dictation = ScriptedDictation::default();
    let (tx, rx) = mpsc::channel();
    let mut capture = AnswerCapture::new(Box::new(dictation.clone()), "en-US");
    capture.set_dictation_sink(runtime::dictation_sink(tx.clone()));
    let mut controller =
        SessionController::new(FakeBackend::with_limits(&[30]), SessionId::from("sess-1"), capture);
    controller.load_session_details().unwrap();
    let mut app = App::new(controller).with_languages(vec!["en-US".into(), "de-DE".into()]);
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::F(2))).unwrap();
    tx.send(key(KeyCode::F(3))).unwrap();
    drain(&mut app, &runner);

    let capture = app.controller.capture();
    assert_eq!(capture.language(), "de-DE");
    assert_eq!(capture.mode(), InputMode::Dictation);
    assert_eq!(*dictation.languages.lock().unwrap(), vec!["en-US", "de-DE"]);
    assert_eq!(app.flash.as_deref(), Some("Dictation language: de-DE"));

    // Phrases from the restarted run land in the answer.
    assert!(dictation.say("guten tag"));
    drain(&mut app, &runner);
    assert_eq!(app.controller.capture().text(), "guten tag");

    tx.send(key(KeyCode::F(3))).unwrap();
    drain(&mut app, &runner);
    assert_eq!(app.controller.capture().language(), "en-US");
}

#[test]
fn f3_does_nothing_with_a_single_language() {
    let mut app = app(FakeBackend::with_limits(&[30]));
    let (tx, rx) = mpsc::channel();
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    tx.send(key(KeyCode::Enter)).unwrap();
    tx.send(key(KeyCode::F(3))).unwrap();
    drain(&mut app, &runner);
    assert_eq!(app.controller.capture().language(), "en-US");
    assert!(app.flash.is_none());
}
