/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Notifications raised by the processor for the host application.
use core::any::Any;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Serialize, Deserialize};

use crate::executor::OpcodeBytes;
use super::StopReason;

/// The state a listener may attach to an event to be handed to the listeners of the
/// subsequent, paired event.
pub type LocalUserState = Option<Box<dyn Any>>;

pub(crate) type Listener<E> = Box<dyn FnMut(&mut E)>;

/// The kind of a [MemoryAccessEvent].
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MemoryAccessEventType {
    BeforeMemoryRead,
    AfterMemoryRead,
    BeforeMemoryWrite,
    AfterMemoryWrite,
    BeforePortRead,
    AfterPortRead,
    BeforePortWrite,
    AfterPortWrite
}

impl MemoryAccessEventType {
    /// Returns `true` for the events fired before the store is accessed.
    pub fn is_before(self) -> bool {
        use MemoryAccessEventType::*;
        matches!(self, BeforeMemoryRead|BeforeMemoryWrite|BeforePortRead|BeforePortWrite)
    }

    /// Returns `true` for the port space events.
    pub fn is_port(self) -> bool {
        use MemoryAccessEventType::*;
        matches!(self, BeforePortRead|AfterPortRead|BeforePortWrite|AfterPortWrite)
    }

    /// Returns `true` for the read events.
    pub fn is_read(self) -> bool {
        use MemoryAccessEventType::*;
        matches!(self, BeforeMemoryRead|AfterMemoryRead|BeforePortRead|AfterPortRead)
    }
}

/// Notifications carrying no payload.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ProcessorNotification {
    /// A maskable interrupt has been accepted.
    MaskableInterruptServicingStart,
    /// A non-maskable interrupt has been accepted.
    NonMaskableInterruptServicingStart,
    /// `RETI` has been fetched and is about to be executed.
    BeforeRetiInstructionExecution,
    /// `RETI` has been executed.
    AfterRetiInstructionExecution,
    /// `RETN` has been fetched and is about to be executed.
    BeforeRetnInstructionExecution,
    /// `RETN` has been executed.
    AfterRetnInstructionExecution
}

macro_rules! stop_requests {
    () => {
        /// Requests the execution loop to stop after the current instruction.
        pub fn stop(&mut self) {
            self.stop_request = Some(StopReason::StopInvoked);
        }

        /// Requests the execution loop to pause after the current instruction.
        pub fn pause(&mut self) {
            self.stop_request = Some(StopReason::PauseInvoked);
        }

        pub(crate) fn take_stop_request(&mut self) -> Option<StopReason> {
            self.stop_request.take()
        }
    };
}

/// Fired before an instruction is fetched.
pub struct BeforeInstructionFetchEvent {
    pc: u16,
    /// Handed to the [BeforeInstructionExecutionEvent] listeners.
    pub local_user_state: LocalUserState,
    stop_request: Option<StopReason>
}

impl BeforeInstructionFetchEvent {
    pub(crate) fn new(pc: u16) -> Self {
        BeforeInstructionFetchEvent { pc, local_user_state: None, stop_request: None }
    }

    /// The address of the instruction about to be fetched.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    stop_requests!{}
}

/// Fired once the instruction has been fully fetched, before it is executed.
pub struct BeforeInstructionExecutionEvent {
    opcode: OpcodeBytes,
    /// Received from the [BeforeInstructionFetchEvent] listeners, handed to the
    /// [AfterInstructionExecutionEvent] listeners.
    pub local_user_state: LocalUserState,
    stop_request: Option<StopReason>
}

impl BeforeInstructionExecutionEvent {
    pub(crate) fn new(opcode: OpcodeBytes, local_user_state: LocalUserState) -> Self {
        BeforeInstructionExecutionEvent { opcode, local_user_state, stop_request: None }
    }

    /// The bytes of the fetched instruction.
    pub fn opcode(&self) -> &[u8] {
        &self.opcode
    }

    stop_requests!{}
}

/// Fired after the instruction has been executed.
pub struct AfterInstructionExecutionEvent {
    opcode: OpcodeBytes,
    total_t_states: u32,
    /// Received from the [BeforeInstructionExecutionEvent] listeners.
    pub local_user_state: LocalUserState,
    stop_request: Option<StopReason>
}

impl AfterInstructionExecutionEvent {
    pub(crate) fn new(opcode: OpcodeBytes, total_t_states: u32, local_user_state: LocalUserState) -> Self {
        AfterInstructionExecutionEvent { opcode, total_t_states, local_user_state, stop_request: None }
    }

    /// The bytes of the executed instruction.
    pub fn opcode(&self) -> &[u8] {
        &self.opcode
    }

    /// T-states the instruction took including wait states.
    pub fn total_t_states(&self) -> u32 {
        self.total_t_states
    }

    stop_requests!{}
}

/// Fired before and after each memory or I/O port access.
///
/// The listeners of the "before" events may change the `value` (read default or the value to be
/// written) or set `cancel` to prevent the store from being accessed. Both are passed on to the
/// listeners of the paired "after" event, whose final `value` is the result of a read.
pub struct MemoryAccessEvent {
    kind: MemoryAccessEventType,
    address: u16,
    /// The value being read or written.
    pub value: u8,
    /// Set to prevent the store from being accessed.
    pub cancel: bool,
    /// Handed from the "before" to the "after" listeners.
    pub local_user_state: LocalUserState,
    stop_request: Option<StopReason>
}

impl MemoryAccessEvent {
    pub(crate) fn new(
            kind: MemoryAccessEventType,
            address: u16,
            value: u8,
            local_user_state: LocalUserState,
            cancel: bool
        ) -> Self
    {
        MemoryAccessEvent { kind, address, value, cancel, local_user_state, stop_request: None }
    }

    /// The kind of the access.
    pub fn kind(&self) -> MemoryAccessEventType {
        self.kind
    }

    /// The memory address or the port number.
    pub fn address(&self) -> u16 {
        self.address
    }

    stop_requests!{}
}

impl fmt::Debug for MemoryAccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAccessEvent")
         .field("kind", &self.kind)
         .field("address", &self.address)
         .field("value", &self.value)
         .field("cancel", &self.cancel)
         .finish_non_exhaustive()
    }
}

/// Registered listeners, invoked in the order of registration.
#[derive(Default)]
pub(crate) struct Listeners {
    pub before_fetch: Vec<Listener<BeforeInstructionFetchEvent>>,
    pub before_execution: Vec<Listener<BeforeInstructionExecutionEvent>>,
    pub after_execution: Vec<Listener<AfterInstructionExecutionEvent>>,
    pub memory_access: Vec<Listener<MemoryAccessEvent>>,
    pub notification: Vec<Box<dyn FnMut(ProcessorNotification)>>
}

impl Listeners {
    pub fn dispatch<E>(listeners: &mut [Listener<E>], event: &mut E) {
        for listener in listeners.iter_mut() {
            listener(event);
        }
    }

    pub fn notify(&mut self, notification: ProcessorNotification) {
        for listener in self.notification.iter_mut() {
            listener(notification);
        }
    }

    pub fn clear(&mut self) {
        *self = Listeners::default();
    }
}
