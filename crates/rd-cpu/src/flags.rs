//! Status register flag layouts

use bitflags::{bitflags, Flags};

use rd_core::Architecture;

bitflags! {
    /// 68000 status register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct M68kStatus: u16 {
        const CARRY      = 0x0001;
        const OVERFLOW   = 0x0002;
        const ZERO       = 0x0004;
        const NEGATIVE   = 0x0008;
        const EXTEND     = 0x0010;
        const INT_MASK   = 0x0700;
        const SUPERVISOR = 0x2000;
        const TRACE      = 0x8000;
    }
}

bitflags! {
    /// Z80 F register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Z80Flags: u8 {
        const CARRY     = 0x01;
        const SUBTRACT  = 0x02;
        const PARITY    = 0x04;
        const BIT3      = 0x08;
        const HALF      = 0x10;
        const BIT5      = 0x20;
        const ZERO      = 0x40;
        const SIGN      = 0x80;
    }
}

bitflags! {
    /// 6502 processor status
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct M6502Flags: u8 {
        const CARRY     = 0x01;
        const ZERO      = 0x02;
        const IRQ_OFF   = 0x04;
        const DECIMAL   = 0x08;
        const BREAK     = 0x10;
        const UNUSED    = 0x20;
        const OVERFLOW  = 0x40;
        const NEGATIVE  = 0x80;
    }
}

bitflags! {
    /// ARM program status register (condition and control bits)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ArmPsr: u32 {
        const NEGATIVE = 1 << 31;
        const ZERO     = 1 << 30;
        const CARRY    = 1 << 29;
        const OVERFLOW = 1 << 28;
        const IRQ_OFF  = 1 << 7;
        const FIQ_OFF  = 1 << 6;
        const THUMB    = 1 << 5;
        const MODE     = 0x1F;
    }
}

impl M68kStatus {
    /// Interrupt priority mask (0-7)
    pub fn interrupt_mask(&self) -> u16 {
        (self.bits() & Self::INT_MASK.bits()) >> 8
    }
}

impl ArmPsr {
    /// Processor mode field
    pub fn mode(&self) -> u32 {
        self.bits() & Self::MODE.bits()
    }
}

const M68K_CCR: [(M68kStatus, char); 5] = [
    (M68kStatus::EXTEND, 'X'),
    (M68kStatus::NEGATIVE, 'N'),
    (M68kStatus::ZERO, 'Z'),
    (M68kStatus::OVERFLOW, 'V'),
    (M68kStatus::CARRY, 'C'),
];

const Z80_F: [(Z80Flags, char); 8] = [
    (Z80Flags::SIGN, 'S'),
    (Z80Flags::ZERO, 'Z'),
    (Z80Flags::BIT5, '5'),
    (Z80Flags::HALF, 'H'),
    (Z80Flags::BIT3, '3'),
    (Z80Flags::PARITY, 'P'),
    (Z80Flags::SUBTRACT, 'N'),
    (Z80Flags::CARRY, 'C'),
];

const M6502_P: [(M6502Flags, char); 8] = [
    (M6502Flags::NEGATIVE, 'N'),
    (M6502Flags::OVERFLOW, 'V'),
    (M6502Flags::UNUSED, '-'),
    (M6502Flags::BREAK, 'B'),
    (M6502Flags::DECIMAL, 'D'),
    (M6502Flags::IRQ_OFF, 'I'),
    (M6502Flags::ZERO, 'Z'),
    (M6502Flags::CARRY, 'C'),
];

const ARM_PSR: [(ArmPsr, char); 7] = [
    (ArmPsr::NEGATIVE, 'N'),
    (ArmPsr::ZERO, 'Z'),
    (ArmPsr::CARRY, 'C'),
    (ArmPsr::OVERFLOW, 'V'),
    (ArmPsr::IRQ_OFF, 'I'),
    (ArmPsr::FIQ_OFF, 'F'),
    (ArmPsr::THUMB, 'T'),
];

/// Set flags as their letter, clear flags as `-`
fn letters<F: Flags + Copy>(value: F, table: &[(F, char)]) -> String {
    table
        .iter()
        .map(|&(flag, letter)| if value.contains(flag) { letter } else { '-' })
        .collect()
}

/// Human-readable flag breakdown for a status register, if `register` is one
pub fn describe_flags(arch: Architecture, register: &str, value: u64) -> Option<String> {
    match (arch, register) {
        (Architecture::M68K, "SR") => {
            let sr = M68kStatus::from_bits_retain(value as u16);
            Some(format!(
                "{}{} I{} {}",
                if sr.contains(M68kStatus::TRACE) { 'T' } else { '-' },
                if sr.contains(M68kStatus::SUPERVISOR) { 'S' } else { '-' },
                sr.interrupt_mask(),
                letters(sr, &M68K_CCR)
            ))
        }
        (Architecture::M68K, "CCR") => {
            Some(letters(M68kStatus::from_bits_retain(value as u16), &M68K_CCR))
        }
        (Architecture::Z80, "F" | "AF") => {
            Some(letters(Z80Flags::from_bits_retain(value as u8), &Z80_F))
        }
        (Architecture::M6502, "P") => {
            Some(letters(M6502Flags::from_bits_retain(value as u8), &M6502_P))
        }
        (Architecture::ARM, "CPSR" | "SPSR") => {
            let psr = ArmPsr::from_bits_retain(value as u32);
            Some(format!("{} M:{:02X}", letters(psr, &ARM_PSR), psr.mode()))
        }
        _ => None,
    }
}
