/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    z80proc is free software: you can redistribute it and/or modify it under
    the terms of the GNU Lesser General Public License (LGPL) as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    z80proc is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Lesser General Public License for more details.

    You should have received a copy of the GNU Lesser General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
/*! # Z80 proc

`z80proc` crate provides a cycle-accurate execution engine for emulators and debuggers based on
Zilog's Z80 CPU.

```text
  _______                                       ___________
=|       |=                                    |           |
=|       |= <-- [ Before/after notifications ] |  Clock    |
=|       |=                                    |  Sync     |
=|  Z80  |=                                    |___________|
=|  Proc |=         ______________                   |
=|       |= <----> | Access       | <----> =[ Memory ]=
=|       |=        | modes + wait |        =[ Ports  ]=
=|       |=        |______________|
=|       |= <----- [ Interrupt sources ]
=|_______|=
     ^
     |
[ Instruction executor ]
```

The [Z80Processor] runs the fetch-decode-execute loop without knowing anything about the instruction
set. The semantics of the instructions are provided by an [InstructionExecutor], which talks back to the
processor through a [ProcessorAgent] for every opcode fetch and every memory or I/O port access.

On the way the processor:

* gates every memory and port access through [access modes][AccessMode] and adds the configured wait
  states to the instruction T-states,
* fires the cancellable [before and after notifications][MemoryAccessEvent] for every access, as well
  as the instruction fetch and execution notifications,
* accepts the non-maskable and the maskable interrupts in all three interrupt modes from the
  registered [interrupt sources][host::InterruptSource],
* stops automatically on `DI` + `HALT` or on `RET` with an empty stack, if configured,
* throttles the emulation to the configured clock frequency with a [ClockSynchronizer].

The [Registers] are plain storage, [Z80Registers] being the default implementation.

## Example

```
use z80proc::*;
use z80proc::host::PlainMemory;
use opconsts::{NOP_OPCODE, RET_OPCODE};

/// Understands only NOP and RET.
struct Tiny;

impl InstructionExecutor for Tiny {
    fn execute<A: ProcessorAgent>(&mut self, agent: &mut A, opcode: u8) -> Result<u16> {
        match opcode {
            RET_OPCODE => {
                agent.instruction_fetch_finished(InstructionKind::RET)?;
                agent.execute_ret()?;
                Ok(10)
            }
            _ => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                Ok(4)
            }
        }
    }
}

let mut cpu = Z80Processor::new(Tiny);
cpu.set_clock_synchronizer(None);
cpu.set_auto_stop_on_ret_with_stack_empty(true);
cpu.memory_mut().set_contents(0, &[NOP_OPCODE, NOP_OPCODE, RET_OPCODE]).unwrap();
// each opcode fetch from the first page takes an extra T-state
cpu.set_memory_wait_states_for_m1(0, 0x100, 1).unwrap();
cpu.start(None).unwrap();
assert_eq!(cpu.stop_reason(), StopReason::RetWithStackEmpty);
assert_eq!(cpu.t_states_elapsed_since_start(), 4 + 4 + 10 + 3);
```
*/
mod cpu;
pub mod clock;
pub mod error;
pub mod executor;
pub mod host;
pub mod z80;

pub use cpu::*;
pub use clock::{ClockSync, ClockSynchronizer};
pub use error::{Result, Violation, Z80Error};
pub use executor::{InstructionExecutor, InstructionKind, OpcodeBytes, ProcessorAgent};
pub use host::Memory;
pub use z80::*;

/// An address of the NMI routine.
pub const NMI_RESTART: u16 = 0x66;

/// Selected Z80 opcodes.
pub mod opconsts {
    /// Extended opcode prefix.
    pub const ED_PREFIX     : u8 = 0xED;
    /// No operation.
    pub const NOP_OPCODE    : u8 = 0x00;
    /// Halt execution.
    pub const HALT_OPCODE   : u8 = 0x76;
    /// Disable interrupts.
    pub const DI_OPCODE     : u8 = 0xF3;
    /// Enable interrupts.
    pub const EI_OPCODE     : u8 = 0xFB;
    /// Return from subroutine.
    pub const RET_OPCODE    : u8 = 0xC9;
    /// The officially documented `RETI` 2nd opcode after [`ED_PREFIX`].
    ///
    /// Match all `RETI` instructions with: `code[0] == ED_PREFIX && (code[1] & 0xCF) == RETI_OPCODE`.
    pub const RETI_OPCODE   : u8 = 0x4D;
    /// The officially documented `RETN` 2nd opcode after [`ED_PREFIX`].
    ///
    /// Match all `RETN` instructions with: `code[0] == ED_PREFIX && (code[1] & 0xCF) == RETN_OPCODE`.
    pub const RETN_OPCODE   : u8 = 0x45;
    /// Load `SP` with a 16-bit immediate value.
    pub const LD_SP_NN_OPCODE: u8 = 0x31;
    /// Call a subroutine.
    pub const CALL_OPCODE   : u8 = 0xCD;
    /// Branch to an absolute address.
    pub const JP_OPCODE     : u8 = 0xC3;
    /// Call a system subroutine at `0x00`.
    pub const RST_00H_OPCODE: u8 = 0xC7;
    /// Call a system subroutine at `0x38`, executed by the interrupt mode 1.
    pub const RST_38H_OPCODE: u8 = 0xFF;
    /// Base of the `RST p` opcode.
    ///
    /// Match instructions with: `(code & RST_OPMASK) == RST_OPBASE`.
    ///
    /// Build instructions with: `RST_OPBASE|addr` where `addr` is one of:
    /// `0x00u8, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38`.
    pub const RST_OPBASE:  u8 = 0b11_000_111;
    /// Opcode mask of the `RST p` instruction.
    pub const RST_OPMASK:  u8 = 0b11_000_111;
}
