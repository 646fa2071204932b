//! # Advance Signal Module
//!
//! The session asks "should we move to the next string?" once per frame.
//! Two answers are provided: a line typed on an interactive terminal, or a
//! fixed time per string when nobody is at the keyboard.

use crossbeam_channel::{Receiver, TryRecvError};
use log::debug;
use std::io::{self, BufRead, BufReader, IsTerminal, Read};
use std::thread;
use std::time::{Duration, Instant};

/// Non-blocking "move on" trigger polled at the bottom of every frame.
pub trait AdvanceSignal {
    /// Returns `true` once per request to advance. Never blocks.
    fn poll(&mut self) -> bool;

    /// Called when a new string starts, to forget anything stale.
    fn rearm(&mut self) {}
}

impl<A: AdvanceSignal + ?Sized> AdvanceSignal for Box<A> {
    fn poll(&mut self) -> bool {
        (**self).poll()
    }

    fn rearm(&mut self) {
        (**self).rearm()
    }
}

/// Advances on every line read from a reader, usually stdin.
///
/// A background thread blocks on the reader and forwards one message per
/// line, so polling is a `try_recv`.
#[derive(Debug)]
pub struct LineAdvance {
    lines: Receiver<()>,
}

impl LineAdvance {
    /// Watches standard input.
    pub fn stdin() -> Self {
        Self::from_reader(io::stdin())
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        let (tx, lines) = crossbeam_channel::unbounded();
        thread::spawn(move || {
            for line in BufReader::new(reader).lines() {
                if line.is_err() || tx.send(()).is_err() {
                    break;
                }
            }
            debug!("[INPUT] Line reader finished");
        });
        Self { lines }
    }
}

impl AdvanceSignal for LineAdvance {
    fn poll(&mut self) -> bool {
        match self.lines.try_recv() {
            Ok(()) => true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => false,
        }
    }

    fn rearm(&mut self) {
        while self.lines.try_recv().is_ok() {}
    }
}

/// Advances after a fixed time on each string.
#[derive(Debug)]
pub struct TimedAdvance {
    period: Duration,
    started: Instant,
}

impl TimedAdvance {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            started: Instant::now(),
        }
    }
}

impl AdvanceSignal for TimedAdvance {
    fn poll(&mut self) -> bool {
        if self.started.elapsed() >= self.period {
            self.started = Instant::now();
            true
        } else {
            false
        }
    }

    fn rearm(&mut self) {
        self.started = Instant::now();
    }
}

/// Picks the advance signal the current process can support.
///
/// An interactive stdin gets [`LineAdvance`]; otherwise (piped, redirected or
/// closed stdin) each string is given `auto_advance` before moving on.
pub fn detect(auto_advance: Duration) -> Box<dyn AdvanceSignal> {
    if io::stdin().is_terminal() {
        debug!("[INPUT] stdin is a terminal, advancing on Enter");
        Box::new(LineAdvance::stdin())
    } else {
        debug!("[INPUT] stdin is not a terminal, advancing every {:?}", auto_advance);
        Box::new(TimedAdvance::new(auto_advance))
    }
}
