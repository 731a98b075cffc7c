/*
    minimal: A minimal instruction executor for z80proc tests.
    Copyright (C) 2019-2024  Rafal Michalski

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.

    Author contact information: see Cargo.toml file, section [package.authors].
*/
#![allow(dead_code)]
use core::cell::RefCell;
use std::rc::Rc;

use simplelog::{Config, LevelFilter, TestLogger};
use z80proc::*;

pub const LD_A_N: u8 = 0x3E;
pub const ADD_A_N: u8 = 0xC6;
pub const INC_A: u8 = 0x3C;
pub const LD_NN_A: u8 = 0x32;
pub const LD_A_NN: u8 = 0x3A;
pub const OUT_N_A: u8 = 0xD3;
pub const IN_A_N: u8 = 0xDB;
pub const IX_PREFIX: u8 = 0xDD;
pub const LD_IX_NN: u8 = 0x21;
pub const IM0: u8 = 0x46;
pub const IM1: u8 = 0x56;
pub const IM2: u8 = 0x5E;
pub const LD_I_A: u8 = 0x47;

/// Executes a handful of instructions, enough to drive the processor in tests.
///
/// Operands are fetched as opcode bytes. Unknown opcodes are executed as `NOP`.
#[derive(Clone, Debug, Default)]
pub struct Minimal {
    /// The first opcode of every executed instruction.
    pub executed: Vec<u8>,
    /// Return without signaling the fetch is finished.
    pub broken: bool,
    /// Request a stop after executing this opcode.
    pub stop_on: Option<u8>
}

fn fetch16<A: ProcessorAgent>(agent: &mut A) -> Result<u16> {
    let lo = agent.fetch_next_opcode()?;
    let hi = agent.fetch_next_opcode()?;
    Ok(u16::from_le_bytes([lo, hi]))
}

impl InstructionExecutor for Minimal {
    fn execute<A: ProcessorAgent>(&mut self, agent: &mut A, opcode: u8) -> Result<u16> {
        use opconsts::*;
        self.executed.push(opcode);
        if self.broken {
            return Ok(4)
        }
        let t_states = match opcode {
            LD_A_N => {
                let n = agent.fetch_next_opcode()?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.registers_mut().set_acc(n);
                7
            }
            ADD_A_N => {
                let n = agent.fetch_next_opcode()?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let acc = agent.registers().get_acc();
                let (res, carry) = acc.overflowing_add(n);
                let mut flags = CpuFlags::mask_szxy(res)
                              | CpuFlags::mask_half_carry_add(acc, n, false)
                              | CpuFlags::mask_overflow_add(acc, n, res);
                flags.set(CpuFlags::C, carry);
                let regs = agent.registers_mut();
                regs.set_acc(res);
                regs.main_mut().set_flags(flags);
                7
            }
            INC_A => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let acc = agent.registers().get_acc();
                agent.registers_mut().set_acc(acc.wrapping_add(1));
                4
            }
            RET_OPCODE => {
                agent.instruction_fetch_finished(InstructionKind::RET)?;
                agent.execute_ret()?;
                10
            }
            DI_OPCODE|EI_OPCODE => {
                agent.instruction_fetch_finished(InstructionKind::EI_OR_DI)?;
                let enable = opcode == EI_OPCODE;
                agent.registers_mut().set_iffs(enable, enable);
                4
            }
            HALT_OPCODE => {
                agent.instruction_fetch_finished(InstructionKind::HALT)?;
                4
            }
            LD_SP_NN_OPCODE => {
                let nn = fetch16(agent)?;
                agent.instruction_fetch_finished(InstructionKind::LD_SP)?;
                agent.registers_mut().set_sp(nn);
                10
            }
            CALL_OPCODE => {
                let nn = fetch16(agent)?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.execute_call(nn)?;
                17
            }
            JP_OPCODE => {
                let nn = fetch16(agent)?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.registers_mut().set_pc(nn);
                10
            }
            LD_NN_A => {
                let nn = fetch16(agent)?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let acc = agent.registers().get_acc();
                agent.write_to_memory(nn, acc)?;
                13
            }
            LD_A_NN => {
                let nn = fetch16(agent)?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let value = agent.read_from_memory(nn)?;
                agent.registers_mut().set_acc(value);
                13
            }
            OUT_N_A => {
                let n = agent.fetch_next_opcode()?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let acc = agent.registers().get_acc();
                agent.write_to_port(u16::from_le_bytes([n, acc]), acc)?;
                11
            }
            IN_A_N => {
                let n = agent.fetch_next_opcode()?;
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                let acc = agent.registers().get_acc();
                let value = agent.read_from_port(u16::from_le_bytes([n, acc]))?;
                agent.registers_mut().set_acc(value);
                11
            }
            IX_PREFIX => {
                // a prefix not followed by an IX instruction acts as a NOP
                if agent.peek_next_opcode()? == LD_IX_NN {
                    agent.fetch_next_opcode()?;
                    let nn = fetch16(agent)?;
                    agent.instruction_fetch_finished(InstructionKind::empty())?;
                    agent.registers_mut().set_ix(nn);
                    14
                }
                else {
                    agent.instruction_fetch_finished(InstructionKind::empty())?;
                    4
                }
            }
            ED_PREFIX => {
                let code = agent.fetch_next_opcode()?;
                match code {
                    IM0|IM1|IM2 => {
                        agent.instruction_fetch_finished(InstructionKind::empty())?;
                        agent.set_interrupt_mode(match code { IM0 => 0, IM1 => 1, _ => 2 })?;
                        8
                    }
                    RETI_OPCODE|RETN_OPCODE => {
                        agent.instruction_fetch_finished(InstructionKind::RET)?;
                        let iff2 = agent.registers().get_iffs().1;
                        agent.registers_mut().set_iffs(iff2, iff2);
                        agent.execute_ret()?;
                        14
                    }
                    LD_I_A => {
                        agent.instruction_fetch_finished(InstructionKind::empty())?;
                        let acc = agent.registers().get_acc();
                        agent.registers_mut().set_i(acc);
                        9
                    }
                    _ => {
                        agent.instruction_fetch_finished(InstructionKind::empty())?;
                        8
                    }
                }
            }
            code if code & RST_OPMASK == RST_OPBASE => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.execute_call(u16::from(code & !RST_OPMASK))?;
                11
            }
            _ => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                4
            }
        };
        if self.stop_on == Some(opcode) {
            agent.stop(false)?;
        }
        Ok(t_states)
    }
}

pub type TestProcessor = Z80Processor<Minimal>;

pub fn init_logger() {
    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}

/// Creates an unthrottled processor with the `program` loaded at address 0.
pub fn processor(program: &[u8]) -> TestProcessor {
    init_logger();
    let mut cpu = Z80Processor::new(Minimal::default());
    cpu.set_clock_synchronizer(None);
    cpu.memory_mut().set_contents(0, program).unwrap();
    cpu
}

/// Stops the execution loop after every `count` instructions.
pub fn stop_after(cpu: &mut TestProcessor, count: usize) {
    let mut left = count;
    cpu.on_after_instruction_execution(move |event| {
        left -= 1;
        if left == 0 {
            left = count;
            event.stop();
        }
    });
}

/// Records every memory access event as `(kind, address, value, cancel)`.
pub fn record_memory_access(cpu: &mut TestProcessor) -> Rc<RefCell<Vec<(MemoryAccessEventType, u16, u8, bool)>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    cpu.on_memory_access(move |event| {
        sink.borrow_mut().push((event.kind(), event.address(), event.value, event.cancel));
    });
    log
}

/// Records every notification.
pub fn record_notifications(cpu: &mut TestProcessor) -> Rc<RefCell<Vec<ProcessorNotification>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    cpu.on_notification(move |notification| sink.borrow_mut().push(notification));
    log
}
