use log::debug;
use std::num::NonZeroU32;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// What a pulse did to the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick { elapsed: u32 },
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
    Expired,
}

/// Background thread that calls `emit(generation)` once per interval.
///
/// Dropping it wakes the thread immediately and joins it, so no pulse is sent
/// after the drop returns.
#[derive(Debug)]
pub struct Metronome {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Metronome {
    pub fn spawn<F>(interval: Duration, generation: u64, emit: F) -> Self
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !emit(generation) {
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        // Closing the channel wakes recv_timeout right away.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Countdown for a single question.
///
/// Pulses carry the generation they were scheduled under; `reset` bumps the
/// generation so pulses queued for an earlier question are ignored.
#[derive(Debug)]
pub struct CountdownTimer {
    time_limit: NonZeroU32,
    elapsed: u32,
    state: TimerState,
    generation: u64,
    metronome: Option<Metronome>,
}

impl CountdownTimer {
    pub fn new(time_limit: NonZeroU32) -> Self {
        Self {
            time_limit,
            elapsed: 0,
            state: TimerState::Idle,
            generation: 0,
            metronome: None,
        }
    }

    pub fn time_limit(&self) -> u32 {
        self.time_limit.get()
    }

    pub fn elapsed(&self) -> u32 {
        self.elapsed
    }

    pub fn remaining(&self) -> u32 {
        self.time_limit.get() - self.elapsed
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_scheduled(&self) -> bool {
        self.metronome.is_some()
    }

    /// Marks the timer running without scheduling pulses; the owner drives `on_pulse`.
    pub fn arm(&mut self) {
        if matches!(self.state, TimerState::Idle | TimerState::Paused) {
            self.state = TimerState::Running;
        }
    }

    /// Starts (or resumes) the countdown with a metronome emitting through `emit`.
    pub fn start<F>(&mut self, interval: Duration, emit: F)
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        if !matches!(self.state, TimerState::Idle | TimerState::Paused) {
            return;
        }
        self.metronome = None;
        self.state = TimerState::Running;
        self.metronome = Some(Metronome::spawn(interval, self.generation, emit));
        debug!(
            "timer started: limit={}s elapsed={} gen={}",
            self.time_limit, self.elapsed, self.generation
        );
    }

    pub fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.metronome = None;
            self.state = TimerState::Paused;
        }
    }

    /// Halts the countdown for good; elapsed is kept for reading.
    pub fn stop(&mut self) {
        self.metronome = None;
        if self.state != TimerState::Expired {
            self.state = TimerState::Idle;
        }
        self.generation += 1;
    }

    /// Rebinds the timer to a new question's limit.
    pub fn reset(&mut self, time_limit: NonZeroU32) {
        self.metronome = None;
        self.time_limit = time_limit;
        self.elapsed = 0;
        self.state = TimerState::Idle;
        self.generation += 1;
    }

    /// Advances one second if `generation` is current and the timer is running.
    pub fn on_pulse(&mut self, generation: u64) -> Vec<TimerEvent> {
        if generation != self.generation || self.state != TimerState::Running {
            return Vec::new();
        }

        self.elapsed += 1;
        let mut events = vec![TimerEvent::Tick {
            elapsed: self.elapsed,
        }];

        if self.elapsed >= self.time_limit.get() {
            self.metronome = None;
            self.state = TimerState::Expired;
            events.push(TimerEvent::Expired);
        }

        events
    }
}
