/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Memory and I/O access mediation.
#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::cpu::Registers;
use crate::error::{Result, Z80Error};
use crate::executor::{InstructionKind, ProcessorAgent};
use crate::host::Memory;
use super::context::ExecutionContext;
use super::events::*;
use super::{Core, InterruptMode, StopReason};

/// The size of the memory address space.
pub const MEMORY_SPACE_SIZE: usize = 0x10000;
/// The size of the I/O port space.
pub const PORTS_SPACE_SIZE: usize = 0x100;
/// The size of the extended I/O port space.
pub const EXTENDED_PORTS_SPACE_SIZE: usize = 0x10000;

const RETI_RETN_PREFIX: u8 = crate::opconsts::ED_PREFIX;
const RETI_RETN_MASK: u8 = 0b1100_1111;

/// Which parts of a transaction the backing store takes part in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AccessMode {
    #[default]
    ReadAndWrite,
    ReadOnly,
    WriteOnly,
    /// Reads yield the values provided by the listeners only, writes are discarded.
    NotConnected
}

impl AccessMode {
    #[inline]
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ReadAndWrite|AccessMode::ReadOnly)
    }

    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ReadAndWrite|AccessMode::WriteOnly)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Space {
    Memory,
    Ports
}

/// Per address access modes and wait states.
#[derive(Clone, Debug)]
pub(crate) struct AccessTables {
    pub memory_modes: Box<[AccessMode]>,
    pub m1_wait_states: Box<[u8]>,
    pub non_m1_wait_states: Box<[u8]>,
    pub port_modes: Vec<AccessMode>,
    pub port_wait_states: Vec<u8>
}

impl Default for AccessTables {
    fn default() -> Self {
        AccessTables {
            memory_modes: vec![AccessMode::default(); MEMORY_SPACE_SIZE].into_boxed_slice(),
            m1_wait_states: vec![0; MEMORY_SPACE_SIZE].into_boxed_slice(),
            non_m1_wait_states: vec![0; MEMORY_SPACE_SIZE].into_boxed_slice(),
            port_modes: vec![AccessMode::default(); PORTS_SPACE_SIZE],
            port_wait_states: vec![0; PORTS_SPACE_SIZE]
        }
    }
}

/// Fills `length` entries of the `table` starting at `start` with `value`.
///
/// Leaves the table unchanged if the range doesn't fit.
pub(crate) fn fill_range<T: Copy>(table: &mut [T], start: u16, length: usize, value: T) -> Result<()> {
    let start = start as usize;
    let size = table.len();
    match start.checked_add(length) {
        Some(end) if end <= size => {
            table[start..end].fill(value);
            Ok(())
        }
        _ => Err(Z80Error::RangeOutOfBounds { start, length, size })
    }
}

impl AccessTables {
    #[inline]
    pub fn is_extended_ports(&self) -> bool {
        self.port_modes.len() == EXTENDED_PORTS_SPACE_SIZE
    }

    /// Maps the port address onto the active port space.
    #[inline]
    pub fn port_index(&self, port: u16) -> u16 {
        if self.is_extended_ports() { port } else { port & 0xFF }
    }

    #[inline]
    pub fn port_mode(&self, port: u16) -> AccessMode {
        self.port_modes[self.port_index(port) as usize]
    }

    #[inline]
    pub fn port_wait_states(&self, port: u16) -> u8 {
        self.port_wait_states[self.port_index(port) as usize]
    }

    /// Resizes the port tables preserving the first 256 entries.
    pub fn resize_ports(&mut self, extended: bool) {
        let size = if extended { EXTENDED_PORTS_SPACE_SIZE } else { PORTS_SPACE_SIZE };
        self.port_modes.resize(size, AccessMode::default());
        self.port_wait_states.resize(size, 0);
    }

    fn mode(&self, space: Space, address: u16) -> AccessMode {
        match space {
            Space::Memory => self.memory_modes[address as usize],
            Space::Ports => self.port_mode(address)
        }
    }
}

impl Space {
    fn read_events(self) -> (MemoryAccessEventType, MemoryAccessEventType) {
        use MemoryAccessEventType::*;
        match self {
            Space::Memory => (BeforeMemoryRead, AfterMemoryRead),
            Space::Ports => (BeforePortRead, AfterPortRead)
        }
    }

    fn write_events(self) -> (MemoryAccessEventType, MemoryAccessEventType) {
        use MemoryAccessEventType::*;
        match self {
            Space::Memory => (BeforeMemoryWrite, AfterMemoryWrite),
            Space::Ports => (BeforePortWrite, AfterPortWrite)
        }
    }
}

impl<R: Registers, M: Memory> Core<R, M> {
    fn fire_memory_access(&mut self, ctx: &mut ExecutionContext, event: &mut MemoryAccessEvent) -> Result<()> {
        Listeners::dispatch(&mut self.listeners.memory_access, event);
        match event.take_stop_request() {
            Some(reason) => ctx.request_stop(reason),
            None => Ok(())
        }
    }

    /// Reads a byte from the store through the listeners, the access modes and the wait states.
    pub(crate) fn mediated_read(
            &mut self,
            ctx: &mut ExecutionContext,
            space: Space,
            address: u16,
            wait_states: u8
        ) -> Result<u8>
    {
        let (before_kind, after_kind) = space.read_events();
        let mut before = MemoryAccessEvent::new(before_kind, address, u8::MAX, None, false);
        self.fire_memory_access(ctx, &mut before)?;
        let value = if !before.cancel && self.tables.mode(space, address).is_readable() {
            self.store(space).read(address)
        }
        else {
            before.value
        };
        ctx.add_wait_states(wait_states);
        let mut after = MemoryAccessEvent::new(after_kind, address, value,
                                               before.local_user_state.take(), before.cancel);
        self.fire_memory_access(ctx, &mut after)?;
        Ok(after.value)
    }

    /// Writes a byte to the store through the listeners, the access modes and the wait states.
    pub(crate) fn mediated_write(
            &mut self,
            ctx: &mut ExecutionContext,
            space: Space,
            address: u16,
            value: u8,
            wait_states: u8
        ) -> Result<()>
    {
        let (before_kind, after_kind) = space.write_events();
        let mut before = MemoryAccessEvent::new(before_kind, address, value, None, false);
        self.fire_memory_access(ctx, &mut before)?;
        if !before.cancel && self.tables.mode(space, address).is_writable() {
            self.store(space).write(address, before.value);
        }
        ctx.add_wait_states(wait_states);
        let mut after = MemoryAccessEvent::new(after_kind, address, before.value,
                                               before.local_user_state.take(), before.cancel);
        self.fire_memory_access(ctx, &mut after)
    }

    pub(crate) fn read_memory(&mut self, ctx: &mut ExecutionContext, address: u16) -> Result<u8> {
        let wait_states = self.tables.non_m1_wait_states[address as usize];
        self.mediated_read(ctx, Space::Memory, address, wait_states)
    }

    pub(crate) fn write_memory(&mut self, ctx: &mut ExecutionContext, address: u16, value: u8) -> Result<()> {
        let wait_states = self.tables.non_m1_wait_states[address as usize];
        self.mediated_write(ctx, Space::Memory, address, value, wait_states)
    }

    /// Pushes `PC` on the machine stack and jumps to `address`.
    pub(crate) fn execute_call(&mut self, ctx: &mut ExecutionContext, address: u16) -> Result<()> {
        let [pc_lo, pc_hi] = self.registers.get_pc().to_le_bytes();
        let mut sp = self.registers.get_sp().wrapping_sub(1);
        self.write_memory(ctx, sp, pc_hi)?;
        sp = sp.wrapping_sub(1);
        self.write_memory(ctx, sp, pc_lo)?;
        self.registers.set_sp(sp);
        self.registers.set_pc(address);
        Ok(())
    }

    /// Pops `PC` from the machine stack.
    pub(crate) fn execute_ret(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let sp = self.registers.get_sp();
        let pc_lo = self.read_memory(ctx, sp)?;
        let pc_hi = self.read_memory(ctx, sp.wrapping_add(1))?;
        self.registers.set_pc(u16::from_le_bytes([pc_lo, pc_hi]));
        self.registers.set_sp(sp.wrapping_add(2));
        Ok(())
    }

    fn store(&mut self, space: Space) -> &mut M {
        match space {
            Space::Memory => &mut self.memory,
            Space::Ports => &mut self.ports
        }
    }

    /// Marks the fetch as complete and fires the "before execution" notifications.
    fn finish_fetch(&mut self, ctx: &mut ExecutionContext, kind: InstructionKind) -> Result<()> {
        if ctx.fetch_complete {
            return Ok(())
        }
        ctx.fetch_complete = true;
        ctx.kind = kind;
        ctx.sp_after_fetch = self.registers.get_sp();
        let mut event = BeforeInstructionExecutionEvent::new(ctx.opcode.clone(),
                                                             ctx.local_user_state.take());
        Listeners::dispatch(&mut self.listeners.before_execution, &mut event);
        ctx.local_user_state = event.local_user_state.take();
        if let Some(reason) = event.take_stop_request() {
            ctx.request_stop(reason)?;
        }
        match reti_or_retn(&ctx.opcode) {
            Some(RetiOrRetn::Reti) => self.listeners.notify(ProcessorNotification::BeforeRetiInstructionExecution),
            Some(RetiOrRetn::Retn) => self.listeners.notify(ProcessorNotification::BeforeRetnInstructionExecution),
            None => {}
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RetiOrRetn {
    Reti,
    Retn
}

/// Recognizes `RETI` and `RETN` including their mirrored opcodes.
pub(crate) fn reti_or_retn(opcode: &[u8]) -> Option<RetiOrRetn> {
    match opcode {
        &[RETI_RETN_PREFIX, code, ..] => match code & RETI_RETN_MASK {
            crate::opconsts::RETI_OPCODE => Some(RetiOrRetn::Reti),
            crate::opconsts::RETN_OPCODE => Some(RetiOrRetn::Retn),
            _ => None
        }
        _ => None
    }
}

/// The processor as seen by the instruction executor while an instruction is being executed.
pub(crate) struct Agent<'a, R, M> {
    pub core: &'a mut Core<R, M>,
    pub ctx: &'a mut ExecutionContext
}

impl<'a, R: Registers, M: Memory> ProcessorAgent for Agent<'a, R, M> {
    type Registers = R;

    fn fetch_next_opcode(&mut self) -> Result<u8> {
        self.ctx.ensure_fetching()?;
        let opcode = match self.ctx.peeked.take() {
            Some((address, opcode)) => {
                self.ctx.add_wait_states(self.core.tables.m1_wait_states[address as usize]);
                opcode
            }
            None => {
                let pc = self.core.registers.get_pc();
                let wait_states = self.core.tables.m1_wait_states[pc as usize];
                self.core.mediated_read(self.ctx, Space::Memory, pc, wait_states)?
            }
        };
        self.ctx.push_opcode(opcode)?;
        let pc = self.core.registers.get_pc();
        self.core.registers.set_pc(pc.wrapping_add(1));
        Ok(opcode)
    }

    fn peek_next_opcode(&mut self) -> Result<u8> {
        self.ctx.ensure_fetching()?;
        if let Some((_, opcode)) = self.ctx.peeked {
            return Ok(opcode)
        }
        let pc = self.core.registers.get_pc();
        let opcode = self.core.mediated_read(self.ctx, Space::Memory, pc, 0)?;
        self.ctx.peeked = Some((pc, opcode));
        Ok(opcode)
    }

    fn instruction_fetch_finished(&mut self, kind: InstructionKind) -> Result<()> {
        self.core.finish_fetch(self.ctx, kind)
    }

    fn read_from_memory(&mut self, address: u16) -> Result<u8> {
        self.ctx.ensure_fetch_complete()?;
        self.core.read_memory(self.ctx, address)
    }

    fn write_to_memory(&mut self, address: u16, value: u8) -> Result<()> {
        self.ctx.ensure_fetch_complete()?;
        self.core.write_memory(self.ctx, address, value)
    }

    fn read_from_port(&mut self, port: u16) -> Result<u8> {
        self.ctx.ensure_fetch_complete()?;
        let port = self.core.tables.port_index(port);
        let wait_states = self.core.tables.port_wait_states(port);
        self.core.mediated_read(self.ctx, Space::Ports, port, wait_states)
    }

    fn write_to_port(&mut self, port: u16, value: u8) -> Result<()> {
        self.ctx.ensure_fetch_complete()?;
        let port = self.core.tables.port_index(port);
        let wait_states = self.core.tables.port_wait_states(port);
        self.core.mediated_write(self.ctx, Space::Ports, port, value, wait_states)
    }

    fn set_interrupt_mode(&mut self, mode: u8) -> Result<()> {
        self.ctx.ensure_fetch_complete()?;
        self.core.interrupt_mode = InterruptMode::try_from(mode)?;
        Ok(())
    }

    fn stop(&mut self, is_pause: bool) -> Result<()> {
        let reason = if is_pause { StopReason::PauseInvoked } else { StopReason::StopInvoked };
        self.ctx.request_stop(reason)
    }

    fn execute_call(&mut self, address: u16) -> Result<()> {
        self.ctx.ensure_fetch_complete()?;
        self.core.execute_call(self.ctx, address)
    }

    fn execute_ret(&mut self) -> Result<()> {
        self.ctx.ensure_fetch_complete()?;
        self.core.execute_ret(self.ctx)
    }

    #[inline]
    fn registers(&self) -> &R {
        &self.core.registers
    }

    #[inline]
    fn registers_mut(&mut self) -> &mut R {
        &mut self.core.registers
    }
}
