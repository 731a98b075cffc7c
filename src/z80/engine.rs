/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! The fetch-decode-execute loop.
use std::panic::{self, AssertUnwindSafe};

use log::{debug, log_enabled, trace, warn, Level};

use crate::cpu::Registers;
use crate::error::{Result, Z80Error};
use crate::executor::{InstructionExecutor, InstructionKind, ProcessorAgent};
use crate::host::Memory;
use crate::opconsts::NOP_OPCODE;
use super::access::{Agent, RetiOrRetn, reti_or_retn};
use super::context::ExecutionContext;
use super::events::*;
use super::{Core, ProcessorState, StopReason, Z80Processor};

impl<X: InstructionExecutor, R: Registers, M: Memory> Z80Processor<X, R, M> {
    /// Runs the loop until a stop reason is latched, returning the T-states of the last instruction.
    ///
    /// On an error or a panic the processor is left stopped with [StopReason::ExceptionThrown].
    pub(super) fn execution_loop(&mut self, single: bool) -> Result<u32> {
        self.ensure_not_running()?;
        let Z80Processor { executor, core } = self;
        core.running = true;
        if let Some(clock) = core.clock.as_mut() {
            clock.start();
        }
        core.stop_reason = StopReason::NotApplicable;
        core.state = ProcessorState::Running;
        debug!("run {}, PC: {:04x}", if single { "single" } else { "continuous" }, core.registers.get_pc());

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| core.run(executor, single)));

        core.running = false;
        if let Some(clock) = core.clock.as_mut() {
            clock.stop();
        }
        match outcome {
            Ok(Ok((t_states, stop_reason))) => {
                core.stop_reason = stop_reason;
                core.state = if stop_reason == StopReason::PauseInvoked {
                    ProcessorState::Paused
                }
                else {
                    ProcessorState::Stopped
                };
                debug!("run ended: {:?}, state: {:?}, last: {} T", stop_reason, core.state, t_states);
                Ok(t_states)
            }
            Ok(Err(err)) => {
                core.abort();
                warn!("run aborted: {}", err);
                Err(err)
            }
            Err(payload) => {
                core.abort();
                warn!("run aborted by a panic");
                panic::resume_unwind(payload)
            }
        }
    }
}

impl<R: Registers, M: Memory> Core<R, M> {
    fn abort(&mut self) {
        self.stop_reason = StopReason::ExceptionThrown;
        self.state = ProcessorState::Stopped;
    }

    fn run<X: InstructionExecutor>(&mut self, executor: &mut X, single: bool) -> Result<(u32, StopReason)> {
        let mut total_t_states = 0;
        loop {
            let mut ctx = ExecutionContext::new();
            self.fire_before_fetch(&mut ctx);
            if ctx.must_stop() {
                return Ok((total_t_states, ctx.stop_reason))
            }

            let address = self.registers.get_pc();
            let t_states = self.execute_instruction(executor, &mut ctx)?;
            if !ctx.fetch_complete {
                return Err(Z80Error::FetchFinishedNotSignaled {
                    address: self.registers.get_pc().wrapping_sub(ctx.opcode.len() as u16),
                    opcode: ctx.opcode
                })
            }
            total_t_states = u32::from(t_states) + ctx.wait_states;
            self.add_t_states(total_t_states);
            if log_enabled!(Level::Trace) {
                trace!("{:04x}: {:02x?} {} T", address, &ctx.opcode[..], total_t_states);
            }

            if ctx.kind.contains(InstructionKind::LD_SP) {
                self.start_of_stack = self.registers.get_sp();
            }
            if !single {
                self.check_auto_stop(&mut ctx);
            }
            self.fire_after_execution(&mut ctx, total_t_states)?;
            if ctx.kind.contains(InstructionKind::HALT) {
                self.is_halted = true;
            }

            let interrupt_t_states = self.accept_pending_interrupt(executor, &mut ctx)?;
            self.add_t_states(interrupt_t_states);
            total_t_states += interrupt_t_states;

            if single {
                return Ok((total_t_states, StopReason::ExecuteNextInstructionInvoked))
            }
            if let Some(clock) = self.clock.as_mut() {
                clock.try_wait(total_t_states);
            }
            if ctx.must_stop() {
                return Ok((total_t_states, ctx.stop_reason))
            }
        }
    }

    fn add_t_states(&mut self, t_states: u32) {
        self.t_states_since_start += u64::from(t_states);
        self.t_states_since_reset += u64::from(t_states);
    }

    /// Fetches the first opcode byte and hands it to the executor.
    ///
    /// While halted a `NOP` is executed without a fetch.
    fn execute_instruction<X: InstructionExecutor>(
            &mut self,
            executor: &mut X,
            ctx: &mut ExecutionContext
        ) -> Result<u16>
    {
        let is_halted = self.is_halted;
        let mut agent = Agent { core: self, ctx };
        if is_halted {
            agent.ctx.push_opcode(NOP_OPCODE)?;
            executor.execute(&mut agent, NOP_OPCODE)
        }
        else {
            let opcode = agent.fetch_next_opcode()?;
            executor.execute(&mut agent, opcode)
        }
    }

    fn check_auto_stop(&self, ctx: &mut ExecutionContext) {
        if self.config.auto_stop_on_di_plus_halt
            && ctx.kind.contains(InstructionKind::HALT)
            && !self.registers.get_iff1()
        {
            ctx.stop_reason = StopReason::DiPlusHalt;
        }
        if self.config.auto_stop_on_ret_with_stack_empty
            && ctx.kind.contains(InstructionKind::RET)
            && ctx.sp_after_fetch == self.start_of_stack
        {
            ctx.stop_reason = StopReason::RetWithStackEmpty;
        }
    }

    fn fire_before_fetch(&mut self, ctx: &mut ExecutionContext) {
        let mut event = BeforeInstructionFetchEvent::new(self.registers.get_pc());
        Listeners::dispatch(&mut self.listeners.before_fetch, &mut event);
        ctx.local_user_state = event.local_user_state.take();
        if let Some(reason) = event.take_stop_request() {
            ctx.stop_reason = reason;
        }
    }

    fn fire_after_execution(&mut self, ctx: &mut ExecutionContext, total_t_states: u32) -> Result<()> {
        let mut event = AfterInstructionExecutionEvent::new(ctx.opcode.clone(), total_t_states,
                                                            ctx.local_user_state.take());
        Listeners::dispatch(&mut self.listeners.after_execution, &mut event);
        if let Some(reason) = event.take_stop_request() {
            ctx.request_stop(reason)?;
        }
        match reti_or_retn(&ctx.opcode) {
            Some(RetiOrRetn::Reti) => self.listeners.notify(ProcessorNotification::AfterRetiInstructionExecution),
            Some(RetiOrRetn::Retn) => self.listeners.notify(ProcessorNotification::AfterRetnInstructionExecution),
            None => {}
        }
        Ok(())
    }
}
