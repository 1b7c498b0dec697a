//! MOS 6502 decoder (documented opcodes)
//!
//! Single-byte and branch opcodes are matched directly; the rest are
//! decoded from the `aaabbbcc` opcode groups.

use rd_core::Architecture;

use crate::cpu_core::{CpuCore, Instruction};
use crate::operand::{self, hex16, hex8};

static REGISTER_NAMES: [&str; 6] = ["A", "X", "Y", "S", "P", "PC"];

/// Addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirect,
    IndirectIndexed,
    Relative,
}

impl Mode {
    /// Operand bytes following the opcode
    fn operand_len(self) -> u32 {
        match self {
            Self::Implied | Self::Accumulator => 0,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 2,
            _ => 1,
        }
    }

    fn base_cycles(self) -> u32 {
        match self {
            Self::Implied | Self::Accumulator | Self::Immediate | Self::Relative => 2,
            Self::ZeroPage => 3,
            Self::ZeroPageX | Self::ZeroPageY | Self::Absolute => 4,
            Self::AbsoluteX | Self::AbsoluteY => 4,
            Self::Indirect => 5,
            Self::IndirectIndexed => 5,
            Self::IndexedIndirect => 6,
        }
    }
}

const GROUP1: [&str; 8] = ["ORA", "AND", "EOR", "ADC", "STA", "LDA", "CMP", "SBC"];
const GROUP2: [&str; 8] = ["ASL", "ROL", "LSR", "ROR", "STX", "LDX", "DEC", "INC"];
const GROUP3: [&str; 8] = ["", "BIT", "JMP", "JMP", "STY", "LDY", "CPY", "CPX"];

fn implied(op: u8) -> Option<(&'static str, u32)> {
    let entry = match op {
        0x00 => ("BRK", 7),
        0x40 => ("RTI", 6),
        0x60 => ("RTS", 6),
        0x08 => ("PHP", 3),
        0x28 => ("PLP", 4),
        0x48 => ("PHA", 3),
        0x68 => ("PLA", 4),
        0x88 => ("DEY", 2),
        0xA8 => ("TAY", 2),
        0xC8 => ("INY", 2),
        0xE8 => ("INX", 2),
        0x18 => ("CLC", 2),
        0x38 => ("SEC", 2),
        0x58 => ("CLI", 2),
        0x78 => ("SEI", 2),
        0x98 => ("TYA", 2),
        0xB8 => ("CLV", 2),
        0xD8 => ("CLD", 2),
        0xF8 => ("SED", 2),
        0x8A => ("TXA", 2),
        0x9A => ("TXS", 2),
        0xAA => ("TAX", 2),
        0xBA => ("TSX", 2),
        0xCA => ("DEX", 2),
        0xEA => ("NOP", 2),
        _ => return None,
    };
    Some(entry)
}

fn branch(op: u8) -> Option<&'static str> {
    let name = match op {
        0x10 => "BPL",
        0x30 => "BMI",
        0x50 => "BVC",
        0x70 => "BVS",
        0x90 => "BCC",
        0xB0 => "BCS",
        0xD0 => "BNE",
        0xF0 => "BEQ",
        _ => return None,
    };
    Some(name)
}

/// Mnemonic and addressing mode for a documented opcode
fn lookup(op: u8) -> Option<(&'static str, Mode)> {
    if let Some((name, _)) = implied(op) {
        return Some((name, Mode::Implied));
    }
    if let Some(name) = branch(op) {
        return Some((name, Mode::Relative));
    }
    match op {
        0x20 => return Some(("JSR", Mode::Absolute)),
        0x6C => return Some(("JMP", Mode::Indirect)),
        _ => {}
    }

    let aaa = (op >> 5) as usize;
    let bbb = (op >> 2) & 7;
    match op & 3 {
        1 => {
            let mode = match bbb {
                0 => Mode::IndexedIndirect,
                1 => Mode::ZeroPage,
                2 => Mode::Immediate,
                3 => Mode::Absolute,
                4 => Mode::IndirectIndexed,
                5 => Mode::ZeroPageX,
                6 => Mode::AbsoluteY,
                _ => Mode::AbsoluteX,
            };
            if op == 0x89 {
                return None; // STA #imm
            }
            Some((GROUP1[aaa], mode))
        }
        2 => {
            let name = GROUP2[aaa];
            let uses_y = name == "STX" || name == "LDX";
            let mode = match bbb {
                0 if name == "LDX" => Mode::Immediate,
                1 => Mode::ZeroPage,
                2 if aaa < 4 => Mode::Accumulator,
                3 => Mode::Absolute,
                5 if uses_y => Mode::ZeroPageY,
                5 => Mode::ZeroPageX,
                7 if name == "LDX" => Mode::AbsoluteY,
                7 if name != "STX" => Mode::AbsoluteX,
                _ => return None,
            };
            Some((name, mode))
        }
        0 => {
            let name = GROUP3[aaa];
            let mode = match (bbb, aaa) {
                (0, 5..=7) => Mode::Immediate,
                (1, 1) | (1, 4..=7) => Mode::ZeroPage,
                (3, 1..=7) => Mode::Absolute,
                (5, 4 | 5) => Mode::ZeroPageX,
                (7, 5) => Mode::AbsoluteX,
                _ => return None,
            };
            Some((name, mode))
        }
        _ => None,
    }
}

fn cycles_for(name: &str, mode: Mode) -> u32 {
    match name {
        "JSR" => 6,
        "JMP" if mode == Mode::Absolute => 3,
        "ASL" | "ROL" | "LSR" | "ROR" | "DEC" | "INC" if mode != Mode::Accumulator => {
            mode.base_cycles() + 2
        }
        _ => mode.base_cycles(),
    }
}

/// MOS 6502 core
#[derive(Debug, Default, Clone, Copy)]
pub struct M6502Core;

impl M6502Core {
    pub fn new() -> Self {
        Self
    }
}

impl CpuCore for M6502Core {
    fn architecture(&self) -> Architecture {
        Architecture::M6502
    }

    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction {
        let address = address & 0xFFFF;
        let wrapped = |addr: u32| read(addr & 0xFFFF);
        let read: &dyn Fn(u32) -> u8 = &wrapped;
        let op = read(address);
        let Some((name, mode)) = lookup(op) else {
            return Instruction::decoded(address, "???", "", 1, 2, read);
        };

        let len = mode.operand_len();
        let lo = if len >= 1 { read(address + 1) } else { 0 };
        let hi = if len >= 2 { read(address + 2) } else { 0 };
        let word = u16::from_le_bytes([lo, hi]);
        let operands = match mode {
            Mode::Implied => String::new(),
            Mode::Accumulator => "A".to_string(),
            Mode::Immediate => format!("#{}", hex8(lo)),
            Mode::ZeroPage => hex8(lo),
            Mode::ZeroPageX => format!("{},X", hex8(lo)),
            Mode::ZeroPageY => format!("{},Y", hex8(lo)),
            Mode::Absolute => hex16(word),
            Mode::AbsoluteX => format!("{},X", hex16(word)),
            Mode::AbsoluteY => format!("{},Y", hex16(word)),
            Mode::Indirect => format!("({})", hex16(word)),
            Mode::IndexedIndirect => format!("({},X)", hex8(lo)),
            Mode::IndirectIndexed => format!("({}),Y", hex8(lo)),
            Mode::Relative => {
                let target = operand::offset(address.wrapping_add(2), lo as i8 as i32);
                hex16(target as u16)
            }
        };

        let cycles = match implied(op) {
            Some((_, cycles)) => cycles,
            None => cycles_for(name, mode),
        };
        Instruction::decoded(address, name, operands, 1 + mode.operand_len(), cycles, read)
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool {
        insn.mnemonic == "JSR"
    }

    fn is_return_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "RTS" | "RTI")
    }

    fn is_jump_instruction(&self, insn: &Instruction) -> bool {
        insn.mnemonic == "JMP"
            || matches!(
                insn.mnemonic.as_str(),
                "BPL" | "BMI" | "BVC" | "BVS" | "BCC" | "BCS" | "BNE" | "BEQ"
            )
    }

    fn register_names(&self) -> &'static [&'static str] {
        &REGISTER_NAMES
    }

    fn min_instruction_size(&self) -> u32 {
        1
    }

    fn max_instruction_size(&self) -> u32 {
        3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(address: u32, bytes: &[u8]) -> Instruction {
        let read = |addr: u32| {
            bytes
                .get(addr.wrapping_sub(address) as usize)
                .copied()
                .unwrap_or(0)
        };
        M6502Core::new().disassemble_instruction(address, &read)
    }

    #[test]
    fn test_fetches_wrap_at_top_of_memory() {
        let mut mem = vec![0u8; 0x10000];
        mem[0xFFFF] = 0xEA;
        let seen = std::cell::RefCell::new(Vec::new());
        let read = |addr: u32| {
            seen.borrow_mut().push(addr);
            mem[addr as usize]
        };

        let core = M6502Core::new();
        let nop = core.disassemble_instruction(0xFFFF, &read);
        assert_eq!(nop.text(), "NOP");
        // Implied mode touches only the opcode byte
        assert!(seen.borrow().iter().all(|&addr| addr == 0xFFFF));

        mem[0xFFFF] = 0x20;
        mem[0x0000] = 0x00;
        mem[0x0001] = 0x80;
        seen.borrow_mut().clear();
        let read = |addr: u32| {
            seen.borrow_mut().push(addr);
            mem[addr as usize]
        };
        let jsr = core.disassemble_instruction(0xFFFF, &read);
        assert_eq!(jsr.text(), "JSR $8000");
        assert_eq!(jsr.bytes, vec![0x20, 0x00, 0x80]);
        assert!(seen.borrow().iter().all(|&addr| addr <= 0xFFFF));
    }

    #[test]
    fn test_jsr_rts() {
        let core = M6502Core::new();
        let jsr = decode_bytes(0x8000, &[0x20, 0x34, 0x12]);
        assert_eq!(jsr.text(), "JSR $1234");
        assert_eq!(jsr.size, 3);
        assert_eq!(jsr.cycles, 6);
        assert!(core.is_call_instruction(&jsr));
        assert_eq!(core.branch_target_address(&jsr), 0x1234);

        let rts = decode_bytes(0, &[0x60]);
        assert!(core.is_return_instruction(&rts));
        assert_eq!(rts.size, 1);
    }

    #[test]
    fn test_branches() {
        let core = M6502Core::new();
        let bne = decode_bytes(0xC000, &[0xD0, 0xFE]);
        assert_eq!(bne.text(), "BNE $C000");
        assert!(core.is_jump_instruction(&bne));
        assert_eq!(core.branch_target_address(&bne), 0xC000);

        let beq = decode_bytes(0xC000, &[0xF0, 0x10]);
        assert_eq!(core.branch_target_address(&beq), 0xC012);
    }

    #[test]
    fn test_jmp_indirect_has_no_target() {
        let core = M6502Core::new();
        let jmp = decode_bytes(0, &[0x6C, 0xFC, 0xFF]);
        assert_eq!(jmp.text(), "JMP ($FFFC)");
        assert!(core.is_jump_instruction(&jmp));
        assert_eq!(core.branch_target_address(&jmp), 0);

        let jmp = decode_bytes(0, &[0x4C, 0x00, 0xC0]);
        assert_eq!(jmp.text(), "JMP $C000");
        assert_eq!(core.branch_target_address(&jmp), 0xC000);
    }

    #[test]
    fn test_addressing_modes() {
        assert_eq!(decode_bytes(0, &[0xA9, 0x01]).text(), "LDA #$01");
        assert_eq!(decode_bytes(0, &[0xB1, 0x20]).text(), "LDA ($20),Y");
        assert_eq!(decode_bytes(0, &[0x81, 0x20]).text(), "STA ($20,X)");
        assert_eq!(decode_bytes(0, &[0x9D, 0x00, 0x02]).text(), "STA $0200,X");
        assert_eq!(decode_bytes(0, &[0xB6, 0x10]).text(), "LDX $10,Y");
        assert_eq!(decode_bytes(0, &[0xBE, 0x00, 0x03]).text(), "LDX $0300,Y");
        assert_eq!(decode_bytes(0, &[0x0A]).text(), "ASL A");
        assert_eq!(decode_bytes(0, &[0xA0, 0x00]).text(), "LDY #$00");
        assert_eq!(decode_bytes(0, &[0x24, 0x30]).text(), "BIT $30");
        assert_eq!(decode_bytes(0, &[0xEA]).text(), "NOP");
    }

    #[test]
    fn test_illegal_opcode() {
        let insn = decode_bytes(0, &[0x02]);
        assert_eq!(insn.mnemonic, "???");
        assert_eq!(insn.size, 1);
        let insn = decode_bytes(0, &[0x89, 0x00]);
        assert_eq!(insn.mnemonic, "???");
    }
}
