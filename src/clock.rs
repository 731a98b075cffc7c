/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # Real-time throttling of the emulation.
//!
//! The processor reports the T-states of every executed instruction to a [ClockSynchronizer],
//! which may block the thread running the execution loop to keep the emulated clock on par
//! with the wall clock.
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Result, Z80Error};

/// The lowest supported effective clock frequency in MHz.
pub const MIN_EFFECTIVE_CLOCK_MHZ: f64 = 0.001;
/// The highest supported effective clock frequency in MHz.
pub const MAX_EFFECTIVE_CLOCK_MHZ: f64 = 100.0;
/// The nominal clock frequency of a newly created processor in MHz.
pub const DEFAULT_CLOCK_MHZ: f64 = 4.0;

/// Returns `frequency_mhz` multiplied by `speed_factor` if the product is in the supported
/// range: [MIN_EFFECTIVE_CLOCK_MHZ]..=[MAX_EFFECTIVE_CLOCK_MHZ].
pub fn effective_clock_frequency(frequency_mhz: f64, speed_factor: f64) -> Result<f64> {
    let frequency = frequency_mhz * speed_factor;
    if (MIN_EFFECTIVE_CLOCK_MHZ..=MAX_EFFECTIVE_CLOCK_MHZ).contains(&frequency) {
        Ok(frequency)
    }
    else {
        Err(Z80Error::ClockFrequencyOutOfRange { frequency })
    }
}

/// An interface to the real-time throttling of the execution loop.
pub trait ClockSynchronizer {
    /// Sets the frequency of the emulated clock. The value is always in the supported range.
    fn set_effective_clock_frequency_mhz(&mut self, frequency_mhz: f64);
    /// Called when the execution loop starts.
    fn start(&mut self);
    /// Called after each instruction with the number of T-states it took.
    ///
    /// May block the calling thread until the real time catches up with the emulated one.
    fn try_wait(&mut self, t_states: u32);
    /// Called when the execution loop ends.
    fn stop(&mut self);
}

/// A [ClockSynchronizer] sleeping the thread in a granularity of at least 10 milliseconds.
///
/// T-states are accumulated since [ClockSynchronizer::start], so the short instructions add up
/// until the pending delay is worth sleeping for.
#[derive(Clone, Debug)]
pub struct ClockSync {
    frequency_mhz: f64,
    started: Option<Instant>,
    t_states: u64
}

impl ClockSync {
    /// The minimal delay the synchronizer would sleep for.
    pub const SLEEP_GRANULARITY: Duration = Duration::from_millis(10);

    /// Creates a synchronizer for the given effective clock frequency.
    pub fn new(frequency_mhz: f64) -> Self {
        ClockSync { frequency_mhz, started: None, t_states: 0 }
    }

    /// Returns the effective clock frequency in MHz.
    pub fn frequency_mhz(&self) -> f64 {
        self.frequency_mhz
    }

    /// Returns the time the emulated clock should have taken since the start.
    fn emulated_duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.t_states as f64 / (self.frequency_mhz * 1e6)).ok()
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        ClockSync::new(DEFAULT_CLOCK_MHZ)
    }
}

impl ClockSynchronizer for ClockSync {
    fn set_effective_clock_frequency_mhz(&mut self, frequency_mhz: f64) {
        self.frequency_mhz = frequency_mhz;
        if self.started.is_some() {
            self.start();
        }
    }

    fn start(&mut self) {
        self.started = Some(Instant::now());
        self.t_states = 0;
    }

    fn try_wait(&mut self, t_states: u32) {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.t_states += u64::from(t_states);
        if let Some(delay) = self.emulated_duration()
                                 .and_then(|due| due.checked_sub(started.elapsed())) {
            if delay >= Self::SLEEP_GRANULARITY {
                thread::sleep(delay);
            }
        }
    }

    fn stop(&mut self) {
        self.started = None;
    }
}
