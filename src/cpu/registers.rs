/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! This module contains cpu registers related building blocks.
use core::convert::TryFrom;
#[cfg(feature = "serde")] use serde::{Serialize, Deserialize};

use crate::error::Z80Error;
use super::{CpuFlags, Registers};

/// The interrupt mode enum.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[repr(u8)]
pub enum InterruptMode {
    #[default]
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
}

impl TryFrom<u8> for InterruptMode {
    type Error = Z80Error;

    #[inline]
    fn try_from(im: u8) -> Result<Self, Self::Error> {
        match im {
            0 => Ok(InterruptMode::Mode0),
            1 => Ok(InterruptMode::Mode1),
            2 => Ok(InterruptMode::Mode2),
            _ => Err(Z80Error::InvalidInterruptMode(im))
        }
    }
}

impl From<InterruptMode> for u8 {
    #[inline]
    fn from(im: InterruptMode) -> u8 {
        im as u8
    }
}

/// An 8-bit register of the main register set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reg8 {
    B, C, D, E, H, L, A, F
}

/// A register pair of the main register set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StkReg16 {
    BC, DE, HL, AF
}

/// A struct that represents a register pair, that can be treated as a single 16-bit
/// register or a separate 8-bit (MSB/LSB) registers.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(from = "u16", into = "u16"))]
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash, Debug)]
pub struct RegisterPair([u8;2]);

impl RegisterPair {
    #[inline]
    pub fn get16(self) -> u16 {
        u16::from_le_bytes(self.0)
    }

    #[inline]
    pub fn set16(&mut self, val: u16) {
        self.0 = val.to_le_bytes();
    }

    #[inline]
    pub fn get8hi(self) -> u8 {
        self.0[1]
    }

    #[inline]
    pub fn get8lo(self) -> u8 {
        self.0[0]
    }

    #[inline]
    pub fn set8hi(&mut self, val: u8) {
        self.0[1] = val;
    }

    #[inline]
    pub fn set8lo(&mut self, val: u8) {
        self.0[0] = val;
    }

    /// Returns `(MSB, LSB)`.
    #[inline]
    pub fn get(self) -> (u8, u8) {
        let [lo, hi] = self.0;
        (hi, lo)
    }

    #[inline]
    pub fn set(&mut self, hi: u8, lo: u8) {
        self.0 = [lo, hi];
    }

    #[inline]
    pub fn inc16(&mut self) {
        self.set16(self.get16().wrapping_add(1));
    }

    #[inline]
    pub fn dec16(&mut self) {
        self.set16(self.get16().wrapping_sub(1));
    }

    #[inline]
    pub fn add16(&mut self, val: u16) {
        self.set16(self.get16().wrapping_add(val));
    }
}

impl From<u16> for RegisterPair {
    fn from(uint: u16) -> Self {
        RegisterPair(uint.to_le_bytes())
    }
}

impl From<RegisterPair> for u16 {
    fn from(pair: RegisterPair) -> Self {
        pair.get16()
    }
}

/// A block of `AF`, `BC`, `DE` and `HL` registers.
///
/// The Z80 has two of them: the main and the alternate one.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct MainRegisters {
    pub af: RegisterPair,
    pub bc: RegisterPair,
    pub de: RegisterPair,
    pub hl: RegisterPair
}

impl MainRegisters {
    /// Returns the content of the selected 8-bit register.
    pub fn get_reg(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::B => self.bc.get8hi(),
            Reg8::C => self.bc.get8lo(),
            Reg8::D => self.de.get8hi(),
            Reg8::E => self.de.get8lo(),
            Reg8::H => self.hl.get8hi(),
            Reg8::L => self.hl.get8lo(),
            Reg8::A => self.af.get8hi(),
            Reg8::F => self.af.get8lo(),
        }
    }

    /// Sets the content of the selected 8-bit register.
    pub fn set_reg(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::B => self.bc.set8hi(val),
            Reg8::C => self.bc.set8lo(val),
            Reg8::D => self.de.set8hi(val),
            Reg8::E => self.de.set8lo(val),
            Reg8::H => self.hl.set8hi(val),
            Reg8::L => self.hl.set8lo(val),
            Reg8::A => self.af.set8hi(val),
            Reg8::F => self.af.set8lo(val),
        }
    }

    #[inline]
    fn pair(&self, src: StkReg16) -> RegisterPair {
        match src {
            StkReg16::BC => self.bc,
            StkReg16::DE => self.de,
            StkReg16::HL => self.hl,
            StkReg16::AF => self.af,
        }
    }

    #[inline]
    fn pair_mut(&mut self, src: StkReg16) -> &mut RegisterPair {
        match src {
            StkReg16::BC => &mut self.bc,
            StkReg16::DE => &mut self.de,
            StkReg16::HL => &mut self.hl,
            StkReg16::AF => &mut self.af,
        }
    }

    /// Returns the content of the selected pair of registers as an unsigned 16-bit integer.
    #[inline]
    pub fn get_reg16(&self, src: StkReg16) -> u16 {
        self.pair(src).get16()
    }

    /// Sets the content of the selected pair of registers.
    #[inline]
    pub fn set_reg16(&mut self, dst: StkReg16, val: u16) {
        self.pair_mut(dst).set16(val)
    }

    /// Returns the current state of the Flags register.
    #[inline]
    pub fn get_flags(&self) -> CpuFlags {
        CpuFlags::from_bits_retain(self.af.get8lo())
    }

    /// Sets the current state of the Flags register.
    #[inline]
    pub fn set_flags(&mut self, flags: CpuFlags) {
        self.af.set8lo(flags.bits());
    }
}

/// The default register file: a main and an alternate register set, index registers,
/// `PC`, `SP`, `I`, `R` and both interrupt flip-flops.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Z80Registers {
    pub main: MainRegisters,
    pub alternate: MainRegisters,
    pub ix: RegisterPair,
    pub iy: RegisterPair,
    pub pc: RegisterPair,
    pub sp: RegisterPair,
    pub ir: RegisterPair,
    pub iff1: bool,
    pub iff2: bool
}

impl Z80Registers {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Registers for Z80Registers {
    #[inline]
    fn main(&self) -> &MainRegisters {
        &self.main
    }

    #[inline]
    fn main_mut(&mut self) -> &mut MainRegisters {
        &mut self.main
    }

    #[inline]
    fn alternate(&self) -> &MainRegisters {
        &self.alternate
    }

    #[inline]
    fn alternate_mut(&mut self) -> &mut MainRegisters {
        &mut self.alternate
    }

    #[inline]
    fn get_pc(&self) -> u16 {
        self.pc.get16()
    }

    #[inline]
    fn set_pc(&mut self, pc: u16) {
        self.pc.set16(pc)
    }

    #[inline]
    fn get_sp(&self) -> u16 {
        self.sp.get16()
    }

    #[inline]
    fn set_sp(&mut self, sp: u16) {
        self.sp.set16(sp)
    }

    #[inline]
    fn get_ix(&self) -> u16 {
        self.ix.get16()
    }

    #[inline]
    fn set_ix(&mut self, ix: u16) {
        self.ix.set16(ix)
    }

    #[inline]
    fn get_iy(&self) -> u16 {
        self.iy.get16()
    }

    #[inline]
    fn set_iy(&mut self, iy: u16) {
        self.iy.set16(iy)
    }

    #[inline]
    fn get_i(&self) -> u8 {
        self.ir.get8hi()
    }

    #[inline]
    fn set_i(&mut self, i: u8) {
        self.ir.set8hi(i)
    }

    #[inline]
    fn get_r(&self) -> u8 {
        self.ir.get8lo()
    }

    #[inline]
    fn set_r(&mut self, r: u8) {
        self.ir.set8lo(r)
    }

    #[inline]
    fn get_iffs(&self) -> (bool, bool) {
        (self.iff1, self.iff2)
    }

    #[inline]
    fn set_iffs(&mut self, iff1: bool, iff2: bool) {
        self.iff1 = iff1;
        self.iff2 = iff2;
    }
}
