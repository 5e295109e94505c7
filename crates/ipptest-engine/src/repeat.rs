// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Attempt loop for one test: initial delay, repeat interval, attempt count.

use std::time::Duration;

/// Where the attempt loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatState {
    /// No attempt made yet.
    Run,
    /// The last attempt asked for another.
    Repeat,
    Done,
}

/// Drives the attempts of one test.
///
/// The first attempt waits `delay`; every later attempt waits `interval`.
#[derive(Debug, Clone)]
pub struct RepeatController {
    delay: Duration,
    interval: Duration,
    attempts: u32,
    state: RepeatState,
}

impl RepeatController {
    pub fn new(delay: Duration, interval: Duration) -> Self {
        Self {
            delay,
            interval,
            attempts: 0,
            state: RepeatState::Run,
        }
    }

    pub fn state(&self) -> RepeatState {
        self.state
    }

    /// Requests sent so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt should be made.
    pub fn should_attempt(&self) -> bool {
        self.state != RepeatState::Done
    }

    /// Start an attempt: returns how long to sleep before sending.
    pub fn begin_attempt(&mut self) -> Duration {
        let wait = self.delay;
        self.delay = self.interval;
        self.attempts += 1;
        wait
    }

    /// Record whether the finished attempt asked for a repeat.
    pub fn finish_attempt(&mut self, repeat_requested: bool) -> RepeatState {
        self.state = if repeat_requested {
            RepeatState::Repeat
        } else {
            RepeatState::Done
        };
        self.state
    }

    /// Stop without another attempt.
    pub fn stop(&mut self) {
        self.state = RepeatState::Done;
    }
}
