/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::clock::{effective_clock_frequency, DEFAULT_CLOCK_MHZ};
use crate::error::Result;

/// The scalar settings of the [Z80Processor][crate::Z80Processor].
///
/// Per address access modes and wait states are set up with the range setters
/// of the processor instead.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcessorConfig {
    /// The nominal clock frequency in MHz.
    pub clock_frequency_mhz: f64,
    /// The emulation speed relative to the nominal clock frequency.
    pub clock_speed_factor: f64,
    /// Stop the execution loop on `HALT` while interrupts are disabled.
    pub auto_stop_on_di_plus_halt: bool,
    /// Stop the execution loop on a return with the stack pointer at the start of the stack.
    pub auto_stop_on_ret_with_stack_empty: bool,
    /// Use 16-bit port addresses, with 65536 ports instead of 256.
    pub use_extended_ports_space: bool
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        ProcessorConfig {
            clock_frequency_mhz: DEFAULT_CLOCK_MHZ,
            clock_speed_factor: 1.0,
            auto_stop_on_di_plus_halt: true,
            auto_stop_on_ret_with_stack_empty: false,
            use_extended_ports_space: false
        }
    }
}

impl ProcessorConfig {
    /// Returns the effective clock frequency in MHz or an error if it's out of the supported range.
    pub fn validate(&self) -> Result<f64> {
        effective_clock_frequency(self.clock_frequency_mhz, self.clock_speed_factor)
    }
}
