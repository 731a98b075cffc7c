/*
    z80proc: ZiLOG Z80 processor execution engine.
    Copyright (C) 2019-2024  Rafal Michalski

    For the full copyright notice, see the lib.rs file.
*/
//! Cpu flags register bits definitions and flag helper methods for instruction executors.
use bitflags::bitflags;

bitflags! {
    /// Z80 Flags, the `F` register.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct CpuFlags: u8 {
        /// Sign Flag.
        const S  = 0b1000_0000;
        /// Zero Flag.
        const Z  = 0b0100_0000;
        /// Undocumented bit 5 of the Flag.
        const Y  = 0b0010_0000;
        /// Half Carry Flag.
        const H  = 0b0001_0000;
        /// Undocumented bit 3 of the Flag.
        const X  = 0b0000_1000;
        /// Parity/Overflow Flag.
        const PV = 0b0000_0100;
        /// Add/Subtract Flag.
        const N  = 0b0000_0010;
        /// Carry Flag.
        const C  = 0b0000_0001;
        /// An alias of [CpuFlags::PV].
        const P  = Self::PV.bits();
        /// An alias of [CpuFlags::PV].
        const V  = Self::PV.bits();
        /// A mask of both undocumented Flag's bits 3 and 5. [CpuFlags::X] | [CpuFlags::Y].
        const XY = Self::X.bits() | Self::Y.bits();
    }
}

impl CpuFlags {
    /// Returns a value of the Sign Flag.
    #[inline]
    pub fn sf(self) -> bool {
        self.contains(CpuFlags::S)
    }

    /// Returns a value of the Zero Flag.
    #[inline]
    pub fn zf(self) -> bool {
        self.contains(CpuFlags::Z)
    }

    /// Returns a value of the Half Carry Flag.
    #[inline]
    pub fn hf(self) -> bool {
        self.contains(CpuFlags::H)
    }

    /// Returns a value of the Parity/Overflow Flag.
    #[inline]
    pub fn pvf(self) -> bool {
        self.contains(CpuFlags::PV)
    }

    /// Returns a value of the Add/Subtract Flag.
    #[inline]
    pub fn nf(self) -> bool {
        self.contains(CpuFlags::N)
    }

    /// Returns a value of the Carry Flag.
    #[inline]
    pub fn cf(self) -> bool {
        self.contains(CpuFlags::C)
    }

    /// Returns [CpuFlags] with [S][CpuFlags::S], [Z][CpuFlags::Z], [X][CpuFlags::X] and [Y][CpuFlags::Y]
    /// set from the 8-bit result of an operation.
    #[inline]
    pub fn mask_szxy(res: u8) -> Self {
        let bits = Self::from_bits_truncate(res & (CpuFlags::S.bits()|CpuFlags::XY.bits()));
        if res == 0 { bits | CpuFlags::Z } else { bits }
    }

    /// Returns [CpuFlags] with the [PV][CpuFlags::PV] Flag set if the number of bits equal to 1
    /// is even in the given value.
    #[inline]
    pub fn parity(res: u8) -> Self {
        if res.count_ones() & 1 == 0 { CpuFlags::PV } else { CpuFlags::empty() }
    }

    /// Returns [CpuFlags] with the [H][CpuFlags::H] Flag set if adding `add` (and `carry`) to `tgt`
    /// carries from bit 3.
    #[inline]
    pub fn mask_half_carry_add(tgt: u8, add: u8, carry: bool) -> Self {
        if (tgt & 0x0F) + (add & 0x0F) + carry as u8 > 0x0F { CpuFlags::H } else { CpuFlags::empty() }
    }

    /// Returns [CpuFlags] with the [V][CpuFlags::V] Flag set if adding `add` to `tgt` with `res`
    /// as a result overflows the signed 8-bit range.
    #[inline]
    pub fn mask_overflow_add(tgt: u8, add: u8, res: u8) -> Self {
        if (tgt ^ res) & (add ^ res) & 0x80 != 0 { CpuFlags::V } else { CpuFlags::empty() }
    }
}
