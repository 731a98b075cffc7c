/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
use std::panic::{self, AssertUnwindSafe};

use super::*;
use crate::executor::{InstructionKind, ProcessorAgent};
use crate::host::InterruptLine;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Act {
    Nop,
    FetchAfterFinish,
    PeekAfterFinish,
    ReadBeforeFinish,
    PortBeforeFinish,
    StopBeforeFinish,
    InvalidInterruptMode,
    TooLong,
    NoFinish,
    Panic
}

struct Scripted(Act);

impl InstructionExecutor for Scripted {
    fn execute<A: ProcessorAgent>(&mut self, agent: &mut A, _opcode: u8) -> Result<u16> {
        match self.0 {
            Act::Nop => {}
            Act::FetchAfterFinish => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.fetch_next_opcode()?;
            }
            Act::PeekAfterFinish => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.peek_next_opcode()?;
            }
            Act::ReadBeforeFinish => {
                agent.read_from_memory(0x8000)?;
            }
            Act::PortBeforeFinish => {
                agent.write_to_port(0xFE, 0)?;
            }
            Act::StopBeforeFinish => {
                agent.stop(false)?;
            }
            Act::InvalidInterruptMode => {
                agent.instruction_fetch_finished(InstructionKind::empty())?;
                agent.set_interrupt_mode(3)?;
            }
            Act::TooLong => {
                for _ in 0..4 {
                    agent.fetch_next_opcode()?;
                }
            }
            Act::NoFinish => {
                agent.fetch_next_opcode()?;
                return Ok(8)
            }
            Act::Panic => panic!("executor failure")
        }
        agent.instruction_fetch_finished(InstructionKind::empty())?;
        Ok(4)
    }
}

fn processor(act: Act) -> Z80Processor<Scripted> {
    let mut cpu = Z80Processor::new(Scripted(act));
    cpu.set_clock_synchronizer(None);
    cpu
}

fn expect_violation(act: Act, violation: Violation) {
    let mut cpu = processor(act);
    let err = cpu.execute_next_instruction().unwrap_err();
    assert_eq!(err.violation(), Some(violation), "{:?}: {}", act, err);
    assert_eq!(cpu.state(), ProcessorState::Stopped);
    assert_eq!(cpu.stop_reason(), StopReason::ExceptionThrown);
}

#[test]
fn processor_defaults() {
    let cpu = processor(Act::Nop);
    assert_eq!(cpu.state(), ProcessorState::Stopped);
    assert_eq!(cpu.stop_reason(), StopReason::NeverRan);
    assert_eq!(cpu.config(), ProcessorConfig::default());
    assert_eq!(cpu.effective_clock_frequency_mhz(), 4.0);
    assert!(cpu.clock_synchronizer().is_none());
    assert_eq!(cpu.interrupt_mode(), InterruptMode::Mode0);
    assert_eq!(cpu.start_of_stack(), 0xFFFF);
    assert_eq!(cpu.t_states_elapsed_since_start(), 0);
    assert_eq!(cpu.t_states_elapsed_since_reset(), 0);
    assert!(!cpu.is_halted());
    assert!(cpu.user_state().is_none());
    assert_eq!(cpu.memory().size(), MEMORY_SPACE_SIZE);
    assert_eq!(cpu.ports().size(), PORTS_SPACE_SIZE);
    assert_eq!(cpu.memory_access_mode(0xFFFF), AccessMode::ReadAndWrite);
    assert_eq!(cpu.port_access_mode(0xFF), AccessMode::ReadAndWrite);
    assert_eq!(cpu.memory_wait_states_for_m1(0), 0);
    assert_eq!(cpu.memory_wait_states_for_non_m1(0), 0);
    assert_eq!(cpu.port_wait_states(0), 0);
    assert!(cpu.registered_interrupt_sources().is_empty());
    assert!(Z80Processor::new(Scripted(Act::Nop)).clock_synchronizer().is_some());
}

#[test]
fn reset_works() {
    let mut cpu = processor(Act::Nop);
    let regs = cpu.registers_mut();
    regs.set_pc(0x1234);
    regs.set_sp(0x8000);
    regs.set_af(0x0102);
    regs.set_iffs(true, true);
    regs.set_i(0x3F);
    cpu.set_interrupt_mode(InterruptMode::Mode2);
    cpu.core.is_halted = true;
    cpu.core.t_states_since_reset = 100;
    cpu.core.t_states_since_start = 200;
    cpu.core.interrupts.nmi_line().pulse();
    assert!(cpu.is_nmi_pending());
    cpu.reset();
    let regs = cpu.registers();
    assert_eq!(regs.get_pc(), 0);
    assert_eq!(regs.get_sp(), 0xFFFF);
    assert_eq!(regs.get_af(), 0xFFFF);
    assert_eq!(regs.get_iffs(), (false, false));
    assert_eq!(regs.get_i(), 0x3F);
    assert_eq!(cpu.interrupt_mode(), InterruptMode::Mode0);
    assert!(!cpu.is_halted());
    assert!(!cpu.is_nmi_pending());
    assert_eq!(cpu.t_states_elapsed_since_reset(), 0);
    assert_eq!(cpu.t_states_elapsed_since_start(), 200);
    assert_eq!(cpu.start_of_stack(), 0xFFFF);
}

#[test]
fn clock_settings_are_validated() {
    let mut cpu = processor(Act::Nop);
    cpu.set_clock_frequency_mhz(3.5).unwrap();
    cpu.set_clock_speed_factor(2.0).unwrap();
    assert_eq!(cpu.effective_clock_frequency_mhz(), 7.0);
    assert!(matches!(cpu.set_clock_frequency_mhz(60.0), Err(Z80Error::ClockFrequencyOutOfRange {..})));
    assert!(cpu.set_clock_speed_factor(0.0).is_err());
    assert_eq!(cpu.clock_frequency_mhz(), 3.5);
    assert_eq!(cpu.clock_speed_factor(), 2.0);
    assert_eq!(cpu.effective_clock_frequency_mhz(), 7.0);
    let config = ProcessorConfig { clock_frequency_mhz: 1000.0, auto_stop_on_di_plus_halt: false, ..cpu.config() };
    assert!(cpu.apply_config(&config).is_err());
    assert!(cpu.auto_stop_on_di_plus_halt());
    cpu.set_auto_stop_on_di_plus_halt(false);
    cpu.set_auto_stop_on_ret_with_stack_empty(true);
    assert!(!cpu.auto_stop_on_di_plus_halt());
    assert!(cpu.auto_stop_on_ret_with_stack_empty());
}

#[test]
fn config_is_applied() {
    let config = ProcessorConfig {
        clock_frequency_mhz: 3.5,
        clock_speed_factor: 0.5,
        auto_stop_on_di_plus_halt: false,
        auto_stop_on_ret_with_stack_empty: true,
        use_extended_ports_space: true
    };
    let cpu = Z80Processor::with_config(Scripted(Act::Nop), config).unwrap();
    assert_eq!(cpu.config(), config);
    assert_eq!(cpu.effective_clock_frequency_mhz(), 1.75);
    assert!(cpu.use_extended_ports_space());
    assert_eq!(cpu.ports().size(), EXTENDED_PORTS_SPACE_SIZE);
    let mut cpu = processor(Act::Nop);
    // the default port store is too small for the extended ports
    assert!(matches!(cpu.apply_config(&config), Err(Z80Error::PortsSpaceTooSmall { size: 256, required: 65536 })));
    assert_eq!(cpu.config(), ProcessorConfig::default());
    cpu.set_ports(PlainMemory::new(0x10000).unwrap()).unwrap();
    cpu.apply_config(&config).unwrap();
    assert_eq!(cpu.config(), config);
}

#[test]
fn range_setters_are_validated() {
    let mut cpu = processor(Act::Nop);
    cpu.set_memory_access_mode(0xFF00, 0x100, AccessMode::ReadOnly).unwrap();
    assert_eq!(cpu.memory_access_mode(0xFEFF), AccessMode::ReadAndWrite);
    assert_eq!(cpu.memory_access_mode(0xFF00), AccessMode::ReadOnly);
    assert_eq!(cpu.memory_access_mode(0xFFFF), AccessMode::ReadOnly);
    assert!(matches!(cpu.set_memory_access_mode(0xFF00, 0x101, AccessMode::NotConnected),
                     Err(Z80Error::RangeOutOfBounds { start: 0xFF00, length: 0x101, size: 0x10000 })));
    assert_eq!(cpu.memory_access_mode(0xFFFF), AccessMode::ReadOnly);
    cpu.set_memory_wait_states_for_m1(0, 0x10000, 1).unwrap();
    cpu.set_memory_wait_states_for_non_m1(0x4000, 0x4000, 2).unwrap();
    assert!(cpu.set_memory_wait_states_for_non_m1(1, 0x10000, 2).is_err());
    assert_eq!(cpu.memory_wait_states_for_m1(0xFFFF), 1);
    assert_eq!(cpu.memory_wait_states_for_non_m1(0x3FFF), 0);
    assert_eq!(cpu.memory_wait_states_for_non_m1(0x4000), 2);
    assert_eq!(cpu.memory_wait_states_for_non_m1(0x8000), 0);
    cpu.set_port_access_mode(0xFE, 2, AccessMode::WriteOnly).unwrap();
    assert!(cpu.set_port_access_mode(0xFE, 3, AccessMode::WriteOnly).is_err());
    assert!(cpu.set_port_wait_states(0x100, 1, 1).is_err());
    cpu.set_port_wait_states(0, 0x100, 3).unwrap();
    assert_eq!(cpu.port_access_mode(0x12FE), AccessMode::WriteOnly);
    assert_eq!(cpu.port_wait_states(0x12FE), 3);
}

#[test]
fn extended_ports_space_works() {
    let mut cpu = processor(Act::Nop);
    cpu.set_port_access_mode(0x10, 1, AccessMode::NotConnected).unwrap();
    cpu.set_port_wait_states(0x10, 1, 5).unwrap();
    assert!(matches!(cpu.set_use_extended_ports_space(true), Err(Z80Error::PortsSpaceTooSmall {..})));
    assert!(!cpu.use_extended_ports_space());
    assert!(cpu.set_ports(PlainMemory::new(0x80).unwrap()).is_err());
    let ports = cpu.set_ports(PlainMemory::new(0x10000).unwrap()).unwrap();
    assert_eq!(ports.size(), 0x100);
    cpu.set_use_extended_ports_space(true).unwrap();
    assert!(cpu.use_extended_ports_space());
    assert_eq!(cpu.port_access_mode(0x0010), AccessMode::NotConnected);
    assert_eq!(cpu.port_wait_states(0x0010), 5);
    assert_eq!(cpu.port_access_mode(0x1010), AccessMode::ReadAndWrite);
    assert_eq!(cpu.port_wait_states(0x1010), 0);
    cpu.set_port_access_mode(0xFF00, 0x100, AccessMode::ReadOnly).unwrap();
    assert!(cpu.set_port_access_mode(0xFF00, 0x101, AccessMode::ReadOnly).is_err());
    // a smaller port store no longer fits
    assert!(cpu.set_ports(PlainMemory::new(0x100).unwrap()).is_err());
    cpu.set_use_extended_ports_space(false).unwrap();
    assert_eq!(cpu.port_access_mode(0x1010), AccessMode::NotConnected);
    assert!(cpu.set_ports(PlainMemory::new(0x100).unwrap()).is_ok());
}

#[test]
fn stores_are_validated() {
    assert!(matches!(Z80Processor::with_parts(Scripted(Act::Nop), Z80Registers::new(),
                                              PlainMemory::new(0x4000).unwrap(), PlainMemory::new(0x100).unwrap()),
                     Err(Z80Error::MemoryTooSmall { size: 0x4000, required: 0x10000 })));
    assert!(matches!(Z80Processor::with_parts(Scripted(Act::Nop), Z80Registers::new(),
                                              PlainMemory::default(), PlainMemory::new(0xFF).unwrap()),
                     Err(Z80Error::PortsSpaceTooSmall { size: 0xFF, required: 0x100 })));
    let mut cpu = Z80Processor::with_parts(Scripted(Act::Nop), Z80Registers::new(),
                                           PlainMemory::default(), PlainMemory::new(0x100).unwrap()).unwrap();
    assert!(cpu.set_memory(PlainMemory::new(0xFFFF).unwrap()).is_err());
    assert!(cpu.set_memory(PlainMemory::new(0x20000).unwrap()).is_ok());
    assert_eq!(cpu.memory().size(), 0x20000);
}

#[test]
fn interrupt_sources_are_registered_once() {
    let mut cpu = processor(Act::Nop);
    let line = Arc::new(InterruptLine::new());
    cpu.register_interrupt_source(line.clone());
    cpu.register_interrupt_source(line.clone());
    assert_eq!(cpu.registered_interrupt_sources().len(), 1);
    assert!(line.pulse_nmi());
    assert!(cpu.is_nmi_pending());
    cpu.unregister_all_interrupt_sources();
    assert!(cpu.registered_interrupt_sources().is_empty());
    assert!(!line.pulse_nmi());
}

#[test]
fn user_state_works() {
    let mut cpu = processor(Act::Nop);
    assert!(cpu.set_user_state(Some(Box::new(42u32))).is_none());
    *cpu.user_state_mut().unwrap().downcast_mut::<u32>().unwrap() += 1;
    assert_eq!(cpu.user_state().unwrap().downcast_ref::<u32>(), Some(&43));
    cpu.on_after_instruction_execution(|event| event.stop());
    cpu.start(None).unwrap();
    assert_eq!(cpu.stop_reason(), StopReason::StopInvoked);
    assert_eq!(cpu.user_state().unwrap().downcast_ref::<u32>(), Some(&43));
}

#[test]
fn agent_protocol_is_enforced() {
    expect_violation(Act::FetchAfterFinish, Violation::FetchAlreadyFinished);
    expect_violation(Act::PeekAfterFinish, Violation::FetchAlreadyFinished);
    expect_violation(Act::ReadBeforeFinish, Violation::FetchNotFinished);
    expect_violation(Act::PortBeforeFinish, Violation::FetchNotFinished);
    expect_violation(Act::StopBeforeFinish, Violation::StopDuringFetch);
    expect_violation(Act::TooLong, Violation::OpcodeTooLong);
    let mut cpu = processor(Act::InvalidInterruptMode);
    assert!(matches!(cpu.execute_next_instruction(), Err(Z80Error::InvalidInterruptMode(3))));
    assert_eq!(cpu.stop_reason(), StopReason::ExceptionThrown);
    assert_eq!(cpu.interrupt_mode(), InterruptMode::Mode0);
}

#[test]
fn missing_fetch_finished_is_reported() {
    let mut cpu = processor(Act::NoFinish);
    cpu.memory_mut().set_contents(0x100, &[0xDD, 0xCB]).unwrap();
    cpu.registers_mut().set_pc(0x100);
    match cpu.execute_next_instruction() {
        Err(Z80Error::FetchFinishedNotSignaled { address, opcode }) => {
            assert_eq!(address, 0x100);
            assert_eq!(&opcode[..], &[0xDD, 0xCB]);
        }
        res => panic!("unexpected: {:?}", res)
    }
    assert_eq!(cpu.stop_reason(), StopReason::ExceptionThrown);
    assert_eq!(cpu.t_states_elapsed_since_reset(), 0);
}

#[test]
fn stop_during_fetch_from_listener_is_a_violation() {
    let mut cpu = processor(Act::Nop);
    cpu.on_memory_access(|event| {
        if event.kind() == MemoryAccessEventType::BeforeMemoryRead {
            event.stop();
        }
    });
    let err = cpu.execute_next_instruction().unwrap_err();
    assert_eq!(err.violation(), Some(Violation::StopDuringFetch));
    assert_eq!(cpu.stop_reason(), StopReason::ExceptionThrown);
}

#[test]
fn panic_stops_the_processor() {
    let mut cpu = processor(Act::Panic);
    let res = panic::catch_unwind(AssertUnwindSafe(|| cpu.execute_next_instruction()));
    assert!(res.is_err());
    assert_eq!(cpu.state(), ProcessorState::Stopped);
    assert_eq!(cpu.stop_reason(), StopReason::ExceptionThrown);
    assert!(!cpu.core.running);
    cpu.executor_mut().0 = Act::Nop;
    assert_eq!(cpu.execute_next_instruction().unwrap(), 4);
    assert_eq!(cpu.stop_reason(), StopReason::ExecuteNextInstructionInvoked);
}

#[test]
fn reentrant_run_is_rejected() {
    let mut cpu = processor(Act::Nop);
    cpu.core.running = true;
    assert_eq!(cpu.start(None).unwrap_err().violation(), Some(Violation::AlreadyRunning));
    assert_eq!(cpu.continue_().unwrap_err().violation(), Some(Violation::AlreadyRunning));
    assert_eq!(cpu.execute_next_instruction().unwrap_err().violation(), Some(Violation::AlreadyRunning));
    assert_eq!(cpu.stop_reason(), StopReason::NeverRan);
}
