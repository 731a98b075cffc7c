/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # The host side of the processor.
//!
//! This module defines the interfaces the [Z80Processor][crate::Z80Processor] uses to reach
//! the emulated machine: the [Memory] stores for the address and the I/O port spaces and the
//! [InterruptSource] devices that request interrupts.
//!
//! Ready-made implementations are provided: [PlainMemory] and [InterruptLine].
use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, Z80Error};

/// A byte store backing either the memory or the I/O port space.
///
/// The processor accesses the store only through its memory access mediator, which takes care
/// of access modes and wait states, so implementations only need to provide plain storage.
pub trait Memory {
    /// Returns the number of bytes the store can hold.
    fn size(&self) -> usize;
    /// Returns the byte at the given `address`.
    fn read(&mut self, address: u16) -> u8;
    /// Stores `value` at the given `address`.
    fn write(&mut self, address: u16, value: u8);
}

/// A flat array of bytes implementing [Memory].
///
/// Reads beyond the store size return `0xFF`, writes beyond it are ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlainMemory {
    bytes: Box<[u8]>
}

impl Default for PlainMemory {
    /// Creates a zeroed 64 KiB memory.
    fn default() -> Self {
        PlainMemory::zeroed(0x10000)
    }
}

impl PlainMemory {
    /// Creates a zeroed memory of the given `size`.
    ///
    /// Returns an error if `size` is 0.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Z80Error::MemoryTooSmall { size, required: 1 })
        }
        Ok(PlainMemory::zeroed(size))
    }

    pub(crate) fn zeroed(size: usize) -> Self {
        PlainMemory { bytes: vec![0; size].into_boxed_slice() }
    }

    /// Copies `contents` into the memory starting at `start`.
    ///
    /// Returns an error and leaves the memory unchanged if the contents don't fit.
    pub fn set_contents(&mut self, start: usize, contents: &[u8]) -> Result<()> {
        let range = self.checked_range(start, contents.len())?;
        self.bytes[range].copy_from_slice(contents);
        Ok(())
    }

    /// Returns `length` bytes of the memory starting at `start`.
    pub fn contents(&self, start: usize, length: usize) -> Result<&[u8]> {
        let range = self.checked_range(start, length)?;
        Ok(&self.bytes[range])
    }

    /// Returns the whole memory as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn checked_range(&self, start: usize, length: usize) -> Result<core::ops::Range<usize>> {
        let size = self.bytes.len();
        match start.checked_add(length) {
            Some(end) if end <= size => Ok(start..end),
            _ => Err(Z80Error::RangeOutOfBounds { start, length, size })
        }
    }
}

impl Memory for PlainMemory {
    #[inline]
    fn size(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    fn read(&mut self, address: u16) -> u8 {
        self.bytes.get(address as usize).copied().unwrap_or(u8::MAX)
    }

    #[inline]
    fn write(&mut self, address: u16, value: u8) {
        if let Some(cell) = self.bytes.get_mut(address as usize) {
            *cell = value;
        }
    }
}

/// A handle to the processor's non-maskable interrupt input.
///
/// Cloned handles share the same line. Pulses are coalesced: any number of pulses before
/// the processor gets to accept the interrupt result in a single NMI.
///
/// The line can be pulsed from any thread.
#[derive(Clone, Debug, Default)]
pub struct NmiLine(Arc<AtomicBool>);

impl NmiLine {
    /// Creates a new line with no pending interrupt.
    pub fn new() -> Self {
        NmiLine::default()
    }

    /// Requests a non-maskable interrupt.
    pub fn pulse(&self) {
        self.0.store(true, Ordering::Release)
    }

    /// Returns `true` if a pulse has not been consumed yet.
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Consumes the pending pulse, returning whether there was one.
    pub(crate) fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::Release)
    }
}

/// A device that can request interrupts from the processor.
///
/// Sources are shared between the processor and the threads emulating the devices, so all the
/// methods take `&self` and implementations should use atomics or locks for their state.
pub trait InterruptSource: Send + Sync {
    /// Called when the source is registered with a processor.
    ///
    /// The source should keep the `line` and [pulse][NmiLine::pulse] it to request an NMI.
    fn attach_nmi(&self, _line: NmiLine) {}
    /// Called when the source is unregistered, the line received by
    /// [InterruptSource::attach_nmi] should be dropped.
    fn detach_nmi(&self) {}
    /// Should return `true` while the source holds the maskable interrupt request line active.
    fn is_int_line_active(&self) -> bool;
    /// Returns the byte the source puts on the data bus when the interrupt is acknowledged.
    ///
    /// Used by interrupt modes 0 and 2. `None` means the data bus floats, which reads as `0xFF`.
    fn value_on_data_bus(&self) -> Option<u8> {
        None
    }
}

const DATA_BUS_PRESENT: u16 = 0x100;

/// A general purpose [InterruptSource] controlled by the host.
///
/// ```
/// use std::sync::Arc;
/// use z80proc::host::{InterruptLine, InterruptSource};
///
/// let line = Arc::new(InterruptLine::new());
/// line.set_value_on_data_bus(Some(0xE0));
/// line.set_int_line_active(true);
/// assert!(line.is_int_line_active());
/// assert_eq!(line.value_on_data_bus(), Some(0xE0));
/// // not registered with any processor yet
/// assert!(!line.pulse_nmi());
/// ```
#[derive(Debug, Default)]
pub struct InterruptLine {
    int_active: AtomicBool,
    data_bus: AtomicU16,
    nmi: Mutex<Option<NmiLine>>
}

impl InterruptLine {
    /// Creates an inactive line with a floating data bus.
    pub fn new() -> Self {
        InterruptLine::default()
    }

    /// Activates or releases the maskable interrupt request line.
    pub fn set_int_line_active(&self, active: bool) {
        self.int_active.store(active, Ordering::Release)
    }

    /// Sets the byte put on the data bus when the interrupt is acknowledged.
    pub fn set_value_on_data_bus(&self, value: Option<u8>) {
        let bus = value.map_or(0, |value| DATA_BUS_PRESENT | value as u16);
        self.data_bus.store(bus, Ordering::Release)
    }

    /// Pulses the NMI line of the processor the source is registered with.
    ///
    /// Returns `false` if the source is not registered.
    pub fn pulse_nmi(&self) -> bool {
        match &*self.nmi_line() {
            Some(line) => {
                line.pulse();
                true
            }
            None => false
        }
    }

    /// Returns `true` if the source is registered with a processor.
    pub fn is_attached(&self) -> bool {
        self.nmi_line().is_some()
    }

    fn nmi_line(&self) -> std::sync::MutexGuard<'_, Option<NmiLine>> {
        self.nmi.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InterruptSource for InterruptLine {
    fn attach_nmi(&self, line: NmiLine) {
        *self.nmi_line() = Some(line);
    }

    fn detach_nmi(&self) {
        *self.nmi_line() = None;
    }

    fn is_int_line_active(&self) -> bool {
        self.int_active.load(Ordering::Acquire)
    }

    fn value_on_data_bus(&self) -> Option<u8> {
        let bus = self.data_bus.load(Ordering::Acquire);
        if bus & DATA_BUS_PRESENT != 0 {
            Some(bus as u8)
        }
        else {
            None
        }
    }
}
