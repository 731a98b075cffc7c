/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Interrupt sources and the interrupt acceptance.
use std::sync::Arc;

use log::debug;

use crate::cpu::Registers;
use crate::error::Result;
use crate::executor::{InstructionExecutor, InstructionKind};
use crate::host::{InterruptSource, Memory, NmiLine};
use crate::{NMI_RESTART, opconsts::RST_38H_OPCODE};
use super::access::Agent;
use super::context::ExecutionContext;
use super::events::ProcessorNotification;
use super::{Core, InterruptMode};

/// T-states of the NMI acknowledge and the call to the service routine.
pub const NMI_T_STATES: u32 = 11;
/// T-states of the maskable interrupt acknowledge in mode 0 and mode 1.
pub const IM0_IM1_T_STATES: u32 = 13;
/// T-states of the maskable interrupt acknowledge in mode 2.
pub const IM2_T_STATES: u32 = 19;

/// Registered interrupt sources in the order of registration.
#[derive(Default)]
pub(crate) struct InterruptSources {
    sources: Vec<Arc<dyn InterruptSource>>,
    nmi: NmiLine
}

fn same_source(a: &Arc<dyn InterruptSource>, b: &Arc<dyn InterruptSource>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl InterruptSources {
    /// Registers the `source` unless it's already registered.
    pub fn register(&mut self, source: Arc<dyn InterruptSource>) {
        if self.sources.iter().any(|registered| same_source(registered, &source)) {
            debug!("interrupt source already registered");
            return
        }
        source.attach_nmi(self.nmi.clone());
        self.sources.push(source);
    }

    /// Detaches all the sources and drops any pending NMI.
    ///
    /// The NMI line is replaced, so the clones still held by the detached sources
    /// no longer reach the processor.
    pub fn unregister_all(&mut self) {
        for source in self.sources.drain(..) {
            source.detach_nmi();
        }
        self.nmi = NmiLine::default();
    }

    pub fn sources(&self) -> &[Arc<dyn InterruptSource>] {
        &self.sources
    }

    pub fn nmi_line(&self) -> &NmiLine {
        &self.nmi
    }

    /// Returns the first source with an active INT line.
    fn active_source(&self) -> Option<Arc<dyn InterruptSource>> {
        self.sources.iter().find(|source| source.is_int_line_active()).cloned()
    }
}

impl<R: Registers, M: Memory> Core<R, M> {
    /// Accepts a pending interrupt after the instruction in `ctx` has been executed.
    ///
    /// Returns the T-states of the interrupt acknowledge, including the wait states
    /// of the memory accesses it performed.
    pub(crate) fn accept_pending_interrupt<X: InstructionExecutor>(
            &mut self,
            executor: &mut X,
            ctx: &mut ExecutionContext
        ) -> Result<u32>
    {
        if ctx.kind.contains(InstructionKind::EI_OR_DI) {
            return Ok(0)
        }
        let wait_states = ctx.wait_states;
        let t_states = if self.interrupts.nmi.take() {
            self.is_halted = false;
            let (_, iff2) = self.registers.get_iffs();
            self.registers.set_iffs(false, iff2);
            debug!("NMI accepted, PC: {:04x}", NMI_RESTART);
            self.listeners.notify(ProcessorNotification::NonMaskableInterruptServicingStart);
            self.execute_call(ctx, NMI_RESTART)?;
            NMI_T_STATES
        }
        else if !self.registers.get_iff1() {
            return Ok(0)
        }
        else if let Some(source) = self.interrupts.active_source() {
            self.registers.set_iffs(false, false);
            self.is_halted = false;
            debug!("interrupt accepted in {:?}", self.interrupt_mode);
            match self.interrupt_mode {
                InterruptMode::Mode0 => {
                    let opcode = source.value_on_data_bus().unwrap_or(u8::MAX);
                    self.listeners.notify(ProcessorNotification::MaskableInterruptServicingStart);
                    executor.execute(&mut Agent { core: &mut *self, ctx: &mut *ctx }, opcode)?;
                    IM0_IM1_T_STATES
                }
                InterruptMode::Mode1 => {
                    self.listeners.notify(ProcessorNotification::MaskableInterruptServicingStart);
                    executor.execute(&mut Agent { core: &mut *self, ctx: &mut *ctx }, RST_38H_OPCODE)?;
                    IM0_IM1_T_STATES
                }
                InterruptMode::Mode2 => {
                    let vector = source.value_on_data_bus().unwrap_or(u8::MAX);
                    let pointer = u16::from_le_bytes([vector, self.registers.get_i()]);
                    self.listeners.notify(ProcessorNotification::MaskableInterruptServicingStart);
                    let lo = self.read_memory(ctx, pointer)?;
                    let hi = self.read_memory(ctx, pointer.wrapping_add(1))?;
                    self.execute_call(ctx, u16::from_le_bytes([lo, hi]))?;
                    IM2_T_STATES
                }
            }
        }
        else {
            return Ok(0)
        };
        Ok(t_states + ctx.wait_states - wait_states)
    }
}
