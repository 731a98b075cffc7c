/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # The contract between the processor and an instruction executor.
//!
//! The [Z80Processor][crate::Z80Processor] knows nothing about the instruction set. For each instruction
//! it fetches the first opcode byte and hands it to an [InstructionExecutor], which in turn talks back to
//! the processor through a [ProcessorAgent] for every other byte fetch, memory or port access.
//!
//! The executor must call [ProcessorAgent::instruction_fetch_finished] exactly when the whole opcode
//! has been fetched and before any other memory or port access.
use arrayvec::ArrayVec;
use bitflags::bitflags;

use crate::cpu::Registers;
use crate::error::Result;

/// The type that stores a copy of the instruction's full byte code.
///
/// The longest Z80 instruction opcode, e.g. `DD CB d op`, is 4 bytes long.
pub type OpcodeBytes = ArrayVec<u8, 4>;

bitflags! {
    /// Describes the instruction that has just been fetched.
    ///
    /// Passed by the executor to [ProcessorAgent::instruction_fetch_finished].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct InstructionKind: u8 {
        /// A return from a subroutine: `RET`, `RET cc`, `RETI`, `RETN`.
        const RET      = 0b0001;
        /// An instruction that loads the stack pointer, e.g. `LD SP,nn`.
        const LD_SP    = 0b0010;
        /// The `HALT` instruction.
        const HALT     = 0b0100;
        /// The `EI` or `DI` instruction.
        const EI_OR_DI = 0b1000;
    }
}

/// The processor capabilities exposed to an [InstructionExecutor].
///
/// An agent exists only while an instruction is being executed.
pub trait ProcessorAgent {
    /// The register file of the processor.
    type Registers: Registers;

    /// Reads the next opcode byte at `PC` using the M1 wait states and increases `PC`.
    ///
    /// Valid only before [ProcessorAgent::instruction_fetch_finished] has been called.
    fn fetch_next_opcode(&mut self) -> Result<u8>;
    /// Reads the next opcode byte at `PC` without increasing `PC`.
    ///
    /// The M1 wait states are charged when the peeked byte is subsequently fetched.
    /// Valid only before [ProcessorAgent::instruction_fetch_finished] has been called.
    fn peek_next_opcode(&mut self) -> Result<u8>;
    /// Signals that the instruction opcode has been fully fetched.
    ///
    /// Triggers the "before instruction execution" notification. Calls after the first one
    /// for the same instruction are ignored.
    fn instruction_fetch_finished(&mut self, kind: InstructionKind) -> Result<()>;
    /// Reads a byte from memory using the non-M1 wait states.
    fn read_from_memory(&mut self, address: u16) -> Result<u8>;
    /// Writes a byte to memory using the non-M1 wait states.
    fn write_to_memory(&mut self, address: u16, value: u8) -> Result<()>;
    /// Reads a byte from the I/O port.
    ///
    /// Only the lower 8 bits of `port` are used unless the extended ports space is enabled.
    fn read_from_port(&mut self, port: u16) -> Result<u8>;
    /// Writes a byte to the I/O port.
    ///
    /// Only the lower 8 bits of `port` are used unless the extended ports space is enabled.
    fn write_to_port(&mut self, port: u16, value: u8) -> Result<()>;
    /// Changes the interrupt mode. Only values 0, 1 and 2 are accepted.
    fn set_interrupt_mode(&mut self, mode: u8) -> Result<()>;
    /// Requests the execution loop to stop or pause after the current instruction.
    fn stop(&mut self, is_pause: bool) -> Result<()>;
    /// Pushes `PC` on the machine stack and jumps to `address`.
    fn execute_call(&mut self, address: u16) -> Result<()>;
    /// Pops `PC` from the machine stack.
    fn execute_ret(&mut self) -> Result<()>;
    /// The processor registers.
    fn registers(&self) -> &Self::Registers;
    /// The processor registers, mutably.
    fn registers_mut(&mut self) -> &mut Self::Registers;
}

/// Executes Z80 instructions on behalf of the [Z80Processor][crate::Z80Processor].
pub trait InstructionExecutor {
    /// Executes the instruction starting with `first_opcode`.
    ///
    /// `PC` already points past `first_opcode` when this method is called.
    ///
    /// At most 4 opcode bytes, including `first_opcode`, can be fetched per instruction;
    /// a fifth fetch fails with [Violation::OpcodeTooLong][crate::Violation::OpcodeTooLong].
    /// Chained prefixes, e.g. `DD DD 21 nn`, should therefore be executed as separate
    /// instructions: a prefix followed by another prefix acts as a `NOP`, which can be
    /// decided with [ProcessorAgent::peek_next_opcode].
    ///
    /// Returns the number of T-states the instruction took, not including any wait states
    /// added by the memory and port tables.
    fn execute<A: ProcessorAgent>(&mut self, agent: &mut A, first_opcode: u8) -> Result<u16>;
}
