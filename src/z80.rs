/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # The [Z80Processor] and its configuration.
//!
//! The processor drives the fetch-decode-execute loop and delegates the semantics of each
//! instruction to an [InstructionExecutor]. On the way it mediates every memory and I/O port
//! access, accepts interrupts, counts T-states and throttles the emulation to the wall clock.
use core::any::Any;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::clock::{ClockSync, ClockSynchronizer, effective_clock_frequency};
use crate::cpu::{InterruptMode, Registers, Z80Registers};
use crate::error::{Result, Violation, Z80Error};
use crate::executor::InstructionExecutor;
use crate::host::{InterruptSource, Memory, PlainMemory};

mod access;
mod config;
mod context;
mod engine;
mod events;
mod interrupt;
#[cfg(test)]
mod tests;

pub use access::{AccessMode, MEMORY_SPACE_SIZE, PORTS_SPACE_SIZE, EXTENDED_PORTS_SPACE_SIZE};
pub use config::ProcessorConfig;
pub use events::*;
pub use interrupt::{NMI_T_STATES, IM0_IM1_T_STATES, IM2_T_STATES};

use access::{AccessTables, fill_range};
use interrupt::InterruptSources;

/// The state of the execution loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProcessorState {
    #[default]
    Stopped,
    Running,
    Paused
}

/// Why the execution loop has ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StopReason {
    /// The processor has never been started.
    #[default]
    NeverRan,
    /// The execution loop is running.
    NotApplicable,
    /// A stop was requested by a listener or the instruction executor.
    StopInvoked,
    /// A pause was requested by a listener or the instruction executor.
    PauseInvoked,
    /// `HALT` was executed with interrupts disabled.
    DiPlusHalt,
    /// A return was executed with the stack pointer at the start of the stack.
    RetWithStackEmpty,
    /// A single instruction was executed by [Z80Processor::execute_next_instruction].
    ExecuteNextInstructionInvoked,
    /// The execution loop was aborted by an error or a panic.
    ExceptionThrown
}

/// Everything the processor owns besides the instruction executor.
///
/// Kept apart so the executor can be handed an agent borrowing the rest of the processor.
pub(crate) struct Core<R, M> {
    pub registers: R,
    pub memory: M,
    pub ports: M,
    pub tables: AccessTables,
    pub listeners: Listeners,
    pub interrupts: InterruptSources,
    pub clock: Option<Box<dyn ClockSynchronizer>>,
    pub config: ProcessorConfig,
    pub effective_clock_mhz: f64,
    pub state: ProcessorState,
    pub stop_reason: StopReason,
    pub t_states_since_start: u64,
    pub t_states_since_reset: u64,
    pub is_halted: bool,
    pub interrupt_mode: InterruptMode,
    pub start_of_stack: u16,
    pub user_state: Option<Box<dyn Any>>,
    pub running: bool
}

/// The Z80 execution engine.
///
/// `X` executes the instructions, `R` holds the registers and `M` is the type of both the memory
/// and the I/O port stores.
///
/// ```
/// use z80proc::{InstructionExecutor, InstructionKind, ProcessorAgent, Result, Z80Processor};
///
/// /// Executes every opcode as a 4 T-states NOP.
/// struct Nops;
///
/// impl InstructionExecutor for Nops {
///     fn execute<A: ProcessorAgent>(&mut self, agent: &mut A, _opcode: u8) -> Result<u16> {
///         agent.instruction_fetch_finished(InstructionKind::empty())?;
///         Ok(4)
///     }
/// }
///
/// let mut cpu = Z80Processor::new(Nops);
/// assert_eq!(cpu.execute_next_instruction().unwrap(), 4);
/// assert_eq!(cpu.registers().pc.get16(), 1);
/// ```
pub struct Z80Processor<X, R = Z80Registers, M = PlainMemory> {
    executor: X,
    core: Core<R, M>
}

impl<X: InstructionExecutor> Z80Processor<X> {
    /// Creates a processor with 64 KiB of plain memory, 256 plain ports and the default
    /// configuration, throttled by a [ClockSync].
    pub fn new(executor: X) -> Self {
        let config = ProcessorConfig::default();
        Z80Processor {
            executor,
            core: Core::new(Z80Registers::new(), PlainMemory::default(),
                            PlainMemory::zeroed(PORTS_SPACE_SIZE), config, config.clock_frequency_mhz)
        }
    }

    /// Creates a processor like [Z80Processor::new] and applies the given `config`.
    ///
    /// When extended ports are requested, the port store is sized for 65536 ports.
    pub fn with_config(executor: X, config: ProcessorConfig) -> Result<Self> {
        let mut cpu = Self::new(executor);
        if config.use_extended_ports_space {
            cpu.core.ports = PlainMemory::zeroed(EXTENDED_PORTS_SPACE_SIZE);
        }
        cpu.apply_config(&config)?;
        Ok(cpu)
    }
}

impl<R: Registers, M: Memory> Core<R, M> {
    fn new(registers: R, memory: M, ports: M, config: ProcessorConfig, effective_clock_mhz: f64) -> Self {
        Core {
            registers,
            memory,
            ports,
            tables: AccessTables::default(),
            listeners: Listeners::default(),
            interrupts: InterruptSources::default(),
            clock: Some(Box::new(ClockSync::new(effective_clock_mhz))),
            config,
            effective_clock_mhz,
            state: ProcessorState::Stopped,
            stop_reason: StopReason::NeverRan,
            t_states_since_start: 0,
            t_states_since_reset: 0,
            is_halted: false,
            interrupt_mode: InterruptMode::Mode0,
            start_of_stack: 0xFFFF,
            user_state: None,
            running: false
        }
    }

    fn ports_space_size(&self) -> usize {
        self.tables.port_modes.len()
    }
}

fn check_memory_size<M: Memory>(memory: &M) -> Result<()> {
    let size = memory.size();
    if size < MEMORY_SPACE_SIZE {
        return Err(Z80Error::MemoryTooSmall { size, required: MEMORY_SPACE_SIZE })
    }
    Ok(())
}

fn check_ports_size<M: Memory>(ports: &M, required: usize) -> Result<()> {
    let size = ports.size();
    if size < required {
        return Err(Z80Error::PortsSpaceTooSmall { size, required })
    }
    Ok(())
}

impl<X: InstructionExecutor, R: Registers, M: Memory> Z80Processor<X, R, M> {
    /// Starts the execution loop.
    ///
    /// Stores the `user_state` if one is given, [resets][Z80Processor::reset] the processor and zeroes
    /// the T-states counted since start. Returns when the loop stops, see [Z80Processor::stop_reason].
    pub fn start(&mut self, user_state: Option<Box<dyn Any>>) -> Result<()> {
        self.ensure_not_running()?;
        if user_state.is_some() {
            self.core.user_state = user_state;
        }
        self.reset();
        self.core.t_states_since_start = 0;
        self.execution_loop(false).map(drop)
    }

    /// Runs the execution loop without resetting the processor.
    pub fn continue_(&mut self) -> Result<()> {
        self.execution_loop(false).map(drop)
    }

    /// Executes a single instruction and accepts a pending interrupt after it.
    ///
    /// Returns the T-states of the instruction and the interrupt acknowledge including wait states.
    pub fn execute_next_instruction(&mut self) -> Result<u32> {
        self.execution_loop(true)
    }
}

impl<X, R: Registers, M: Memory> Z80Processor<X, R, M> {
    /// Creates a processor from its parts with the default configuration.
    ///
    /// `memory` must hold at least 65536 bytes and `ports` at least 256.
    pub fn with_parts(executor: X, registers: R, memory: M, ports: M) -> Result<Self> {
        check_memory_size(&memory)?;
        check_ports_size(&ports, PORTS_SPACE_SIZE)?;
        let config = ProcessorConfig::default();
        let core = Core::new(registers, memory, ports, config, config.clock_frequency_mhz);
        Ok(Z80Processor { executor, core })
    }

    pub(crate) fn ensure_not_running(&self) -> Result<()> {
        if self.core.running {
            return Err(Violation::AlreadyRunning.into())
        }
        Ok(())
    }

    /// Resets the processor.
    ///
    /// `PC` is set to 0, `AF` and `SP` to `0xFFFF`, interrupts are disabled in mode 0,
    /// the halted state and a pending NMI are cleared. The start of the stack is set to `SP`.
    pub fn reset(&mut self) {
        let core = &mut self.core;
        core.registers.set_iffs(false, false);
        core.registers.set_pc(0);
        core.registers.set_af(0xFFFF);
        core.registers.set_sp(0xFFFF);
        core.interrupt_mode = InterruptMode::Mode0;
        core.interrupts.nmi_line().clear();
        core.is_halted = false;
        core.t_states_since_reset = 0;
        core.start_of_stack = core.registers.get_sp();
    }

    pub fn state(&self) -> ProcessorState {
        self.core.state
    }

    pub fn stop_reason(&self) -> StopReason {
        self.core.stop_reason
    }

    pub fn t_states_elapsed_since_start(&self) -> u64 {
        self.core.t_states_since_start
    }

    pub fn t_states_elapsed_since_reset(&self) -> u64 {
        self.core.t_states_since_reset
    }

    pub fn is_halted(&self) -> bool {
        self.core.is_halted
    }

    pub fn interrupt_mode(&self) -> InterruptMode {
        self.core.interrupt_mode
    }

    pub fn set_interrupt_mode(&mut self, mode: InterruptMode) {
        self.core.interrupt_mode = mode;
    }

    /// The stack pointer value regarded as an empty stack.
    pub fn start_of_stack(&self) -> u16 {
        self.core.start_of_stack
    }

    pub fn registers(&self) -> &R {
        &self.core.registers
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.core.registers
    }

    pub fn memory(&self) -> &M {
        &self.core.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.core.memory
    }

    /// Replaces the memory store, returning the previous one.
    pub fn set_memory(&mut self, memory: M) -> Result<M> {
        check_memory_size(&memory)?;
        Ok(core::mem::replace(&mut self.core.memory, memory))
    }

    pub fn ports(&self) -> &M {
        &self.core.ports
    }

    pub fn ports_mut(&mut self) -> &mut M {
        &mut self.core.ports
    }

    /// Replaces the I/O port store, returning the previous one.
    ///
    /// The store must hold the whole port space: 256 bytes or 65536 with the extended ports space.
    pub fn set_ports(&mut self, ports: M) -> Result<M> {
        check_ports_size(&ports, self.core.ports_space_size())?;
        Ok(core::mem::replace(&mut self.core.ports, ports))
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut X {
        &mut self.executor
    }

    pub fn user_state(&self) -> Option<&dyn Any> {
        self.core.user_state.as_deref()
    }

    pub fn user_state_mut(&mut self) -> Option<&mut (dyn Any + 'static)> {
        self.core.user_state.as_deref_mut()
    }

    pub fn set_user_state(&mut self, user_state: Option<Box<dyn Any>>) -> Option<Box<dyn Any>> {
        core::mem::replace(&mut self.core.user_state, user_state)
    }

    /// Returns the current configuration.
    pub fn config(&self) -> ProcessorConfig {
        self.core.config
    }

    /// Applies all of the `config` settings.
    ///
    /// Nothing is changed if any of the settings is invalid.
    pub fn apply_config(&mut self, config: &ProcessorConfig) -> Result<()> {
        let effective = config.validate()?;
        if config.use_extended_ports_space {
            check_ports_size(&self.core.ports, EXTENDED_PORTS_SPACE_SIZE)?;
        }
        self.set_use_extended_ports_space(config.use_extended_ports_space)?;
        self.core.config = *config;
        self.update_effective_clock(effective);
        Ok(())
    }

    pub fn clock_frequency_mhz(&self) -> f64 {
        self.core.config.clock_frequency_mhz
    }

    /// Sets the nominal clock frequency.
    ///
    /// Fails if the frequency multiplied by the clock speed factor is out of the supported range.
    pub fn set_clock_frequency_mhz(&mut self, frequency_mhz: f64) -> Result<()> {
        let effective = effective_clock_frequency(frequency_mhz, self.core.config.clock_speed_factor)?;
        self.core.config.clock_frequency_mhz = frequency_mhz;
        self.update_effective_clock(effective);
        Ok(())
    }

    pub fn clock_speed_factor(&self) -> f64 {
        self.core.config.clock_speed_factor
    }

    /// Sets the emulation speed relative to the nominal clock frequency.
    ///
    /// Fails if the clock frequency multiplied by the factor is out of the supported range.
    pub fn set_clock_speed_factor(&mut self, factor: f64) -> Result<()> {
        let effective = effective_clock_frequency(self.core.config.clock_frequency_mhz, factor)?;
        self.core.config.clock_speed_factor = factor;
        self.update_effective_clock(effective);
        Ok(())
    }

    /// The clock frequency multiplied by the speed factor in MHz.
    pub fn effective_clock_frequency_mhz(&self) -> f64 {
        self.core.effective_clock_mhz
    }

    fn update_effective_clock(&mut self, effective: f64) {
        self.core.effective_clock_mhz = effective;
        if let Some(clock) = self.core.clock.as_mut() {
            clock.set_effective_clock_frequency_mhz(effective);
        }
    }

    pub fn auto_stop_on_di_plus_halt(&self) -> bool {
        self.core.config.auto_stop_on_di_plus_halt
    }

    pub fn set_auto_stop_on_di_plus_halt(&mut self, enabled: bool) {
        self.core.config.auto_stop_on_di_plus_halt = enabled;
    }

    pub fn auto_stop_on_ret_with_stack_empty(&self) -> bool {
        self.core.config.auto_stop_on_ret_with_stack_empty
    }

    pub fn set_auto_stop_on_ret_with_stack_empty(&mut self, enabled: bool) {
        self.core.config.auto_stop_on_ret_with_stack_empty = enabled;
    }

    pub fn use_extended_ports_space(&self) -> bool {
        self.core.config.use_extended_ports_space
    }

    /// Switches between 256 and 65536 I/O ports.
    ///
    /// The access modes and wait states of the first 256 ports are preserved, the other ports
    /// are read-write with no wait states. Switching on requires a port store of 65536 bytes.
    pub fn set_use_extended_ports_space(&mut self, extended: bool) -> Result<()> {
        if extended == self.core.tables.is_extended_ports() {
            return Ok(())
        }
        if extended {
            check_ports_size(&self.core.ports, EXTENDED_PORTS_SPACE_SIZE)?;
        }
        self.core.tables.resize_ports(extended);
        self.core.config.use_extended_ports_space = extended;
        Ok(())
    }

    pub fn clock_synchronizer(&self) -> Option<&dyn ClockSynchronizer> {
        self.core.clock.as_deref()
    }

    /// Replaces the clock synchronizer. `None` runs the processor at full speed.
    ///
    /// The new synchronizer receives the current effective clock frequency.
    pub fn set_clock_synchronizer(&mut self, clock: Option<Box<dyn ClockSynchronizer>>) {
        self.core.clock = clock;
        let effective = self.core.effective_clock_mhz;
        self.update_effective_clock(effective);
    }

    /// Sets the access mode of `length` memory addresses starting at `start`.
    pub fn set_memory_access_mode(&mut self, start: u16, length: usize, mode: AccessMode) -> Result<()> {
        fill_range(&mut self.core.tables.memory_modes, start, length, mode)
    }

    pub fn memory_access_mode(&self, address: u16) -> AccessMode {
        self.core.tables.memory_modes[address as usize]
    }

    /// Sets the access mode of `length` ports starting at `start`.
    pub fn set_port_access_mode(&mut self, start: u16, length: usize, mode: AccessMode) -> Result<()> {
        fill_range(&mut self.core.tables.port_modes, start, length, mode)
    }

    /// Returns the access mode of the port. Only the low 8 bits of `port` are used
    /// unless the extended ports space is enabled.
    pub fn port_access_mode(&self, port: u16) -> AccessMode {
        self.core.tables.port_mode(port)
    }

    /// Sets the wait states added to the opcode fetches of `length` addresses starting at `start`.
    pub fn set_memory_wait_states_for_m1(&mut self, start: u16, length: usize, wait_states: u8) -> Result<()> {
        fill_range(&mut self.core.tables.m1_wait_states, start, length, wait_states)
    }

    pub fn memory_wait_states_for_m1(&self, address: u16) -> u8 {
        self.core.tables.m1_wait_states[address as usize]
    }

    /// Sets the wait states added to the data reads and writes of `length` addresses starting at `start`.
    pub fn set_memory_wait_states_for_non_m1(&mut self, start: u16, length: usize, wait_states: u8) -> Result<()> {
        fill_range(&mut self.core.tables.non_m1_wait_states, start, length, wait_states)
    }

    pub fn memory_wait_states_for_non_m1(&self, address: u16) -> u8 {
        self.core.tables.non_m1_wait_states[address as usize]
    }

    /// Sets the wait states added to the accesses of `length` ports starting at `start`.
    pub fn set_port_wait_states(&mut self, start: u16, length: usize, wait_states: u8) -> Result<()> {
        fill_range(&mut self.core.tables.port_wait_states, start, length, wait_states)
    }

    pub fn port_wait_states(&self, port: u16) -> u8 {
        self.core.tables.port_wait_states(port)
    }

    /// Registers an interrupt source. Registering the same source again has no effect.
    pub fn register_interrupt_source(&mut self, source: Arc<dyn InterruptSource>) {
        self.core.interrupts.register(source)
    }

    pub fn registered_interrupt_sources(&self) -> &[Arc<dyn InterruptSource>] {
        self.core.interrupts.sources()
    }

    /// Detaches and removes all interrupt sources, dropping any pending NMI.
    pub fn unregister_all_interrupt_sources(&mut self) {
        self.core.interrupts.unregister_all()
    }

    /// Returns `true` if an NMI has been requested and not accepted yet.
    pub fn is_nmi_pending(&self) -> bool {
        self.core.interrupts.nmi_line().is_pending()
    }

    /// Adds a listener called before each instruction is fetched.
    pub fn on_before_instruction_fetch<F>(&mut self, listener: F)
        where F: FnMut(&mut BeforeInstructionFetchEvent) + 'static
    {
        self.core.listeners.before_fetch.push(Box::new(listener))
    }

    /// Adds a listener called when an instruction has been fetched, before it's executed.
    pub fn on_before_instruction_execution<F>(&mut self, listener: F)
        where F: FnMut(&mut BeforeInstructionExecutionEvent) + 'static
    {
        self.core.listeners.before_execution.push(Box::new(listener))
    }

    /// Adds a listener called after each instruction.
    pub fn on_after_instruction_execution<F>(&mut self, listener: F)
        where F: FnMut(&mut AfterInstructionExecutionEvent) + 'static
    {
        self.core.listeners.after_execution.push(Box::new(listener))
    }

    /// Adds a listener called before and after each memory and I/O port access.
    pub fn on_memory_access<F>(&mut self, listener: F)
        where F: FnMut(&mut MemoryAccessEvent) + 'static
    {
        self.core.listeners.memory_access.push(Box::new(listener))
    }

    /// Adds a listener of the interrupt and `RETI`/`RETN` notifications.
    pub fn on_notification<F>(&mut self, listener: F)
        where F: FnMut(ProcessorNotification) + 'static
    {
        self.core.listeners.notification.push(Box::new(listener))
    }

    /// Removes all listeners.
    pub fn clear_listeners(&mut self) {
        self.core.listeners.clear()
    }
}
