/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Errors reported by the processor and its collaborators.
use core::fmt;
use thiserror::Error;

use crate::executor::OpcodeBytes;

/// A result type used throughout this crate.
pub type Result<T> = core::result::Result<T, Z80Error>;

/// A contract between the processor and its caller or its instruction executor has been broken.
///
/// Each of these indicates a bug in the calling code, not a condition to recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Violation {
    /// A run was requested while the execution loop is already active.
    AlreadyRunning,
    /// An opcode fetch or peek was requested after the fetch has been finished.
    FetchAlreadyFinished,
    /// A memory, port or interrupt mode access was requested before the fetch has been finished.
    FetchNotFinished,
    /// A stop was requested while the opcode is still being fetched.
    StopDuringFetch,
    /// The executor fetched more opcode bytes than any instruction has.
    OpcodeTooLong,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Violation::AlreadyRunning =>
                "the processor can't be started while the execution loop is running",
            Violation::FetchAlreadyFinished =>
                "opcodes can be fetched only before the instruction fetch has been finished",
            Violation::FetchNotFinished =>
                "agent members other than fetching opcodes can be invoked only after the instruction fetch has been finished",
            Violation::StopDuringFetch =>
                "a stop can't be requested while the instruction is being fetched",
            Violation::OpcodeTooLong =>
                "too many opcode bytes fetched for a single instruction",
        })
    }
}

/// All errors of this crate.
#[derive(Debug, Error)]
pub enum Z80Error {
    /// See [Violation].
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),
    /// The instruction executor returned without signaling that the instruction fetch has been finished.
    #[error("instruction fetch finished was not signaled for the instruction at {address:#06x}, fetched: {opcode:02x?}")]
    FetchFinishedNotSignaled {
        /// The address of the first opcode byte.
        address: u16,
        /// The opcode bytes fetched so far.
        opcode: OpcodeBytes
    },
    /// A table range does not fit into its address or port space.
    #[error("start {start} + length {length} goes beyond the space of {size} entries")]
    RangeOutOfBounds {
        start: usize,
        length: usize,
        size: usize
    },
    /// Only modes 0, 1 and 2 exist.
    #[error("interrupt mode can be set to 0, 1 or 2 only, got {0}")]
    InvalidInterruptMode(u8),
    /// Clock frequency multiplied by the speed factor is outside of the supported range.
    #[error("effective clock frequency {frequency} MHz must be between {} and {} MHz",
            crate::clock::MIN_EFFECTIVE_CLOCK_MHZ, crate::clock::MAX_EFFECTIVE_CLOCK_MHZ)]
    ClockFrequencyOutOfRange {
        frequency: f64
    },
    /// The memory store can't hold the whole address space.
    #[error("memory must have at least {required} bytes, got {size}")]
    MemoryTooSmall {
        size: usize,
        required: usize
    },
    /// The port store can't hold the whole port space.
    #[error("ports space must have at least {required} bytes, got {size}")]
    PortsSpaceTooSmall {
        size: usize,
        required: usize
    },
    /// An error raised by the instruction executor.
    #[error(transparent)]
    Executor(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<Violation> for Z80Error {
    fn from(violation: Violation) -> Self {
        Z80Error::ProtocolViolation(violation)
    }
}

impl Z80Error {
    /// Returns the violation if this is a protocol violation.
    pub fn violation(&self) -> Option<Violation> {
        match self {
            Z80Error::ProtocolViolation(violation) => Some(*violation),
            _ => None
        }
    }
}
