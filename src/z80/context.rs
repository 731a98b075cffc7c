/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use crate::error::{Result, Violation};
use crate::executor::{InstructionKind, OpcodeBytes};
use super::events::LocalUserState;
use super::StopReason;

/// The state of a single instruction being executed.
///
/// Created by the execution loop for each instruction and dropped when the instruction
/// (and the interrupt accepted after it) completes.
pub(crate) struct ExecutionContext {
    pub opcode: OpcodeBytes,
    pub fetch_complete: bool,
    /// `(address, opcode)` of the byte read ahead by a peek.
    pub peeked: Option<(u16, u8)>,
    pub wait_states: u32,
    pub kind: InstructionKind,
    pub sp_after_fetch: u16,
    pub local_user_state: LocalUserState,
    pub stop_reason: StopReason
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext {
            opcode: OpcodeBytes::new(),
            fetch_complete: false,
            peeked: None,
            wait_states: 0,
            kind: InstructionKind::empty(),
            sp_after_fetch: 0,
            local_user_state: None,
            stop_reason: StopReason::NotApplicable
        }
    }

    #[inline]
    pub fn must_stop(&self) -> bool {
        self.stop_reason != StopReason::NotApplicable
    }

    #[inline]
    pub fn add_wait_states(&mut self, wait_states: u8) {
        self.wait_states += u32::from(wait_states);
    }

    pub fn push_opcode(&mut self, opcode: u8) -> Result<()> {
        self.opcode.try_push(opcode).map_err(|_| Violation::OpcodeTooLong.into())
    }

    pub fn ensure_fetching(&self) -> Result<()> {
        if self.fetch_complete {
            return Err(Violation::FetchAlreadyFinished.into())
        }
        Ok(())
    }

    pub fn ensure_fetch_complete(&self) -> Result<()> {
        if !self.fetch_complete {
            return Err(Violation::FetchNotFinished.into())
        }
        Ok(())
    }

    /// Latches a stop or pause requested by the executor or a memory access listener.
    pub fn request_stop(&mut self, reason: StopReason) -> Result<()> {
        if !self.fetch_complete {
            return Err(Violation::StopDuringFetch.into())
        }
        self.stop_reason = reason;
        Ok(())
    }
}
