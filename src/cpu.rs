/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! # [Registers] trait is defined here.
mod flags;
mod registers;

pub use flags::*;
pub use registers::*;

/// The register file of the Z80 processor.
///
/// The [Z80Processor][crate::Z80Processor] only requires plain storage from the implementations,
/// see [Z80Registers] for the default one.
pub trait Registers {
    /// Returns the main `AF`, `BC`, `DE`, `HL` register set.
    fn main(&self) -> &MainRegisters;
    /// Returns the main register set, mutably.
    fn main_mut(&mut self) -> &mut MainRegisters;
    /// Returns the alternate `AF'`, `BC'`, `DE'`, `HL'` register set.
    fn alternate(&self) -> &MainRegisters;
    /// Returns the alternate register set, mutably.
    fn alternate_mut(&mut self) -> &mut MainRegisters;
    /// Returns the current value of the program counter.
    fn get_pc(&self) -> u16;
    /// Sets the current value of the program counter.
    fn set_pc(&mut self, pc: u16);
    /// Returns the current value of the stack pointer.
    fn get_sp(&self) -> u16;
    /// Sets the current value of the stack pointer.
    fn set_sp(&mut self, sp: u16);
    /// Returns the `IX` index register.
    fn get_ix(&self) -> u16;
    /// Sets the `IX` index register.
    fn set_ix(&mut self, ix: u16);
    /// Returns the `IY` index register.
    fn get_iy(&self) -> u16;
    /// Sets the `IY` index register.
    fn set_iy(&mut self, iy: u16);
    /// Returns the current value of the interrupt page `I` register.
    fn get_i(&self) -> u8;
    /// Sets the current value of the interrupt page `I` register.
    fn set_i(&mut self, i: u8);
    /// Returns the current value of the memory refresh register `R`.
    fn get_r(&self) -> u8;
    /// Sets the memory refresh register `R` value.
    fn set_r(&mut self, r: u8);
    /// Returns values of interrupt flip-flops `(iff1, iff2)`.
    fn get_iffs(&self) -> (bool, bool);
    /// Sets the values of interrupt flip-flops.
    fn set_iffs(&mut self, iff1: bool, iff2: bool);

    /// Returns the `AF` register pair as an unsigned 16-bit integer.
    #[inline]
    fn get_af(&self) -> u16 {
        self.main().af.get16()
    }
    /// Sets the `AF` register pair from an unsigned 16-bit integer.
    #[inline]
    fn set_af(&mut self, af: u16) {
        self.main_mut().af.set16(af)
    }
    /// Returns the Accumulator value.
    #[inline]
    fn get_acc(&self) -> u8 {
        self.main().af.get8hi()
    }
    /// Sets the Accumulator value.
    #[inline]
    fn set_acc(&mut self, val: u8) {
        self.main_mut().af.set8hi(val)
    }
    /// Returns the `interrupt flip-flop 1`, which gates the maskable interrupts.
    #[inline]
    fn get_iff1(&self) -> bool {
        self.get_iffs().0
    }
    /// Swaps the `AF` register with its alternative counterpart `AF'`.
    fn ex_af_af(&mut self) {
        let af = self.main().af;
        let af_alt = self.alternate().af;
        self.main_mut().af = af_alt;
        self.alternate_mut().af = af;
    }
    /// Swaps the `BC`, `DE` and `HL` registers with their alternative counterparts `BC'`, `DE'` and `HL'`.
    fn exx(&mut self) {
        let MainRegisters { bc, de, hl, .. } = *self.main();
        let alt = *self.alternate();
        let main = self.main_mut();
        main.bc = alt.bc;
        main.de = alt.de;
        main.hl = alt.hl;
        let alt = self.alternate_mut();
        alt.bc = bc;
        alt.de = de;
        alt.hl = hl;
    }
}
