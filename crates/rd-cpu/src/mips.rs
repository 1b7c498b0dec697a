//! MIPS I decoder
//!
//! Registers print with their ABI names (`$sp`, `$ra`); resolved targets
//! print as `0x` hex so they cannot be confused with a register operand.

use rd_core::Architecture;

use crate::cpu_core::{CpuCore, Instruction};
use crate::operand;

const ABI_NAMES: [&str; 32] = [
    "$zero", "$at", "$v0", "$v1", "$a0", "$a1", "$a2", "$a3", "$t0", "$t1", "$t2", "$t3", "$t4",
    "$t5", "$t6", "$t7", "$s0", "$s1", "$s2", "$s3", "$s4", "$s5", "$s6", "$s7", "$t8", "$t9",
    "$k0", "$k1", "$gp", "$sp", "$fp", "$ra",
];

static REGISTER_NAMES: [&str; 35] = [
    "$0", "$1", "$2", "$3", "$4", "$5", "$6", "$7", "$8", "$9", "$10", "$11", "$12", "$13", "$14",
    "$15", "$16", "$17", "$18", "$19", "$20", "$21", "$22", "$23", "$24", "$25", "$26", "$27",
    "$28", "$29", "$30", "$31", "PC", "HI", "LO",
];

fn reg(n: u32) -> &'static str {
    ABI_NAMES[(n & 31) as usize]
}

fn target(value: u32) -> String {
    format!("0x{:08X}", value)
}

fn imm(value: i32) -> String {
    if value < 0 {
        format!("-0x{:X}", value.unsigned_abs())
    } else {
        format!("0x{:X}", value)
    }
}

fn decode(word: u32, address: u32) -> Option<(String, String)> {
    let opcode = word >> 26;
    let rs = (word >> 21) & 31;
    let rt = (word >> 16) & 31;
    let rd = (word >> 11) & 31;
    let shamt = (word >> 6) & 31;
    let simm = word as u16 as i16 as i32;
    let uimm = word & 0xFFFF;
    let branch_target = operand::offset(address.wrapping_add(4), simm << 2);

    let (name, operands) = match opcode {
        0x00 => {
            if word == 0 {
                return Some(("NOP".into(), String::new()));
            }
            match word & 0x3F {
                0x00 => ("SLL", format!("{},{},{}", reg(rd), reg(rt), shamt)),
                0x02 => ("SRL", format!("{},{},{}", reg(rd), reg(rt), shamt)),
                0x03 => ("SRA", format!("{},{},{}", reg(rd), reg(rt), shamt)),
                0x04 => ("SLLV", format!("{},{},{}", reg(rd), reg(rt), reg(rs))),
                0x06 => ("SRLV", format!("{},{},{}", reg(rd), reg(rt), reg(rs))),
                0x07 => ("SRAV", format!("{},{},{}", reg(rd), reg(rt), reg(rs))),
                0x08 => ("JR", reg(rs).to_string()),
                0x09 if rd == 31 => ("JALR", reg(rs).to_string()),
                0x09 => ("JALR", format!("{},{}", reg(rd), reg(rs))),
                0x0C => ("SYSCALL", String::new()),
                0x0D => ("BREAK", String::new()),
                0x10 => ("MFHI", reg(rd).to_string()),
                0x11 => ("MTHI", reg(rs).to_string()),
                0x12 => ("MFLO", reg(rd).to_string()),
                0x13 => ("MTLO", reg(rs).to_string()),
                0x18 => ("MULT", format!("{},{}", reg(rs), reg(rt))),
                0x19 => ("MULTU", format!("{},{}", reg(rs), reg(rt))),
                0x1A => ("DIV", format!("{},{}", reg(rs), reg(rt))),
                0x1B => ("DIVU", format!("{},{}", reg(rs), reg(rt))),
                0x20 => ("ADD", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x21 if rt == 0 => ("MOVE", format!("{},{}", reg(rd), reg(rs))),
                0x21 => ("ADDU", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x22 => ("SUB", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x23 => ("SUBU", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x24 => ("AND", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x25 => ("OR", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x26 => ("XOR", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x27 => ("NOR", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x2A => ("SLT", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                0x2B => ("SLTU", format!("{},{},{}", reg(rd), reg(rs), reg(rt))),
                _ => return None,
            }
        }
        0x01 => {
            let name = match rt {
                0x00 => "BLTZ",
                0x01 => "BGEZ",
                0x10 => "BLTZAL",
                0x11 => "BGEZAL",
                _ => return None,
            };
            (name, format!("{},{}", reg(rs), target(branch_target)))
        }
        0x02 | 0x03 => {
            let dest = (address.wrapping_add(4) & 0xF000_0000) | ((word & 0x03FF_FFFF) << 2);
            (if opcode == 0x02 { "J" } else { "JAL" }, target(dest))
        }
        0x04 if rs == 0 && rt == 0 => ("B", target(branch_target)),
        0x04 => ("BEQ", format!("{},{},{}", reg(rs), reg(rt), target(branch_target))),
        0x05 => ("BNE", format!("{},{},{}", reg(rs), reg(rt), target(branch_target))),
        0x06 => ("BLEZ", format!("{},{}", reg(rs), target(branch_target))),
        0x07 => ("BGTZ", format!("{},{}", reg(rs), target(branch_target))),
        0x08 => ("ADDI", format!("{},{},{}", reg(rt), reg(rs), imm(simm))),
        0x09 if rs == 0 => ("LI", format!("{},{}", reg(rt), imm(simm))),
        0x09 => ("ADDIU", format!("{},{},{}", reg(rt), reg(rs), imm(simm))),
        0x0A => ("SLTI", format!("{},{},{}", reg(rt), reg(rs), imm(simm))),
        0x0B => ("SLTIU", format!("{},{},{}", reg(rt), reg(rs), imm(simm))),
        0x0C => ("ANDI", format!("{},{},0x{:X}", reg(rt), reg(rs), uimm)),
        0x0D => ("ORI", format!("{},{},0x{:X}", reg(rt), reg(rs), uimm)),
        0x0E => ("XORI", format!("{},{},0x{:X}", reg(rt), reg(rs), uimm)),
        0x0F => ("LUI", format!("{},0x{:X}", reg(rt), uimm)),
        0x20 | 0x21 | 0x22 | 0x23 | 0x24 | 0x25 | 0x26 | 0x28 | 0x29 | 0x2A | 0x2B | 0x2E => {
            let name = match opcode {
                0x20 => "LB",
                0x21 => "LH",
                0x22 => "LWL",
                0x23 => "LW",
                0x24 => "LBU",
                0x25 => "LHU",
                0x26 => "LWR",
                0x28 => "SB",
                0x29 => "SH",
                0x2A => "SWL",
                0x2B => "SW",
                _ => "SWR",
            };
            (name, format!("{},{}({})", reg(rt), imm(simm), reg(rs)))
        }
        _ => return None,
    };
    Some((name.to_string(), operands))
}

/// MIPS I core
#[derive(Debug, Default, Clone, Copy)]
pub struct MipsCore;

impl MipsCore {
    pub fn new() -> Self {
        Self
    }
}

impl CpuCore for MipsCore {
    fn architecture(&self) -> Architecture {
        Architecture::MIPS
    }

    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction {
        let word = self.architecture().endianness().read_value(read, address, 4) as u32;
        match decode(word, address) {
            Some((mnemonic, operands)) => {
                let cycles = if mnemonic.starts_with("DIV") { 36 } else { 1 };
                Instruction::decoded(address, mnemonic, operands, 4, cycles, read)
            }
            None => Instruction::decoded(address, ".WORD", format!("0x{:08X}", word), 4, 1, read),
        }
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool {
        matches!(
            insn.mnemonic.as_str(),
            "JAL" | "JALR" | "BLTZAL" | "BGEZAL"
        )
    }

    fn is_return_instruction(&self, insn: &Instruction) -> bool {
        insn.mnemonic == "JR" && insn.operands == "$ra"
    }

    fn is_jump_instruction(&self, insn: &Instruction) -> bool {
        match insn.mnemonic.as_str() {
            "JR" => insn.operands != "$ra",
            "J" | "B" | "BEQ" | "BNE" | "BLEZ" | "BGTZ" | "BLTZ" | "BGEZ" => true,
            _ => false,
        }
    }

    /// Only `0x` literals are targets; `$`-prefixed fields are registers
    fn branch_target_address(&self, insn: &Instruction) -> u32 {
        let field = operand::last_field(&insn.operands);
        if field.starts_with("0x") {
            operand::parse_hex_literal(field).unwrap_or(0)
        } else {
            0
        }
    }

    fn register_names(&self) -> &'static [&'static str] {
        &REGISTER_NAMES
    }

    fn min_instruction_size(&self) -> u32 {
        4
    }

    fn max_instruction_size(&self) -> u32 {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_word(address: u32, word: u32) -> Instruction {
        let bytes = word.to_be_bytes();
        let read = |addr: u32| bytes[(addr.wrapping_sub(address) & 3) as usize];
        MipsCore::new().disassemble_instruction(address, &read)
    }

    #[test]
    fn test_jal_and_return() {
        let core = MipsCore::new();
        let jal = decode_word(0x8001_0000, 0x0C00_4000);
        assert_eq!(jal.text(), "JAL 0x80010000");
        assert!(core.is_call_instruction(&jal));
        assert_eq!(core.branch_target_address(&jal), 0x8001_0000);

        let jr = decode_word(0, 0x03E0_0008);
        assert_eq!(jr.text(), "JR $ra");
        assert!(core.is_return_instruction(&jr));
        assert!(!core.is_jump_instruction(&jr));
        assert_eq!(core.branch_target_address(&jr), 0);
    }

    #[test]
    fn test_register_operand_is_not_a_target() {
        let core = MipsCore::new();
        let jalr = decode_word(0, 0x0080_F809);
        assert_eq!(jalr.text(), "JALR $a0");
        assert!(core.is_call_instruction(&jalr));
        assert_eq!(core.branch_target_address(&jalr), 0);
    }

    #[test]
    fn test_branches() {
        let core = MipsCore::new();
        let beq = decode_word(0x1000, 0x1109_0004);
        assert_eq!(beq.text(), "BEQ $t0,$t1,0x00001014");
        assert!(core.is_jump_instruction(&beq));
        assert_eq!(core.branch_target_address(&beq), 0x1014);

        let b = decode_word(0x1000, 0x1000_FFFF);
        assert_eq!(b.text(), "B 0x00001000");
    }

    #[test]
    fn test_alu_and_memory() {
        assert_eq!(decode_word(0, 0).text(), "NOP");
        assert_eq!(decode_word(0, 0x3C08_8001).text(), "LUI $t0,0x8001");
        assert_eq!(decode_word(0, 0x27BD_FFE8).text(), "ADDIU $sp,$sp,-0x18");
        assert_eq!(decode_word(0, 0xAFBF_0014).text(), "SW $ra,0x14($sp)");
        assert_eq!(decode_word(0, 0x0085_1021).text(), "ADDU $v0,$a0,$a1");
        assert_eq!(decode_word(0, 0x2402_0001).text(), "LI $v0,0x1");
    }

    #[test]
    fn test_unknown_word() {
        let insn = decode_word(0, 0xFC00_0000);
        assert_eq!(insn.mnemonic, ".WORD");
        assert_eq!(insn.size, 4);
    }
}
