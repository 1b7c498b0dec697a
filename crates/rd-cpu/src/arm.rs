//! ARM (32-bit ARM state) decoder
//!
//! Decodes branches, BX/BLX, data processing, single and block transfers,
//! multiplies and SWI. Words are read in the architecture's byte order.

use rd_core::Architecture;

use crate::cpu_core::{CpuCore, Instruction};
use crate::operand::{self, hex32};

const CONDITIONS: [&str; 16] = [
    "EQ", "NE", "CS", "CC", "MI", "PL", "VS", "VC", "HI", "LS", "GE", "LT", "GT", "LE", "", "NV",
];

const DATA_OPS: [&str; 16] = [
    "AND", "EOR", "SUB", "RSB", "ADD", "ADC", "SBC", "RSC", "TST", "TEQ", "CMP", "CMN", "ORR",
    "MOV", "BIC", "MVN",
];

const SHIFTS: [&str; 4] = ["LSL", "LSR", "ASR", "ROR"];

static REGISTER_NAMES: [&str; 18] = [
    "R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "R13", "R14",
    "R15", "CPSR", "SPSR",
];

fn reg(n: u32) -> &'static str {
    const NAMES: [&str; 16] = [
        "R0", "R1", "R2", "R3", "R4", "R5", "R6", "R7", "R8", "R9", "R10", "R11", "R12", "SP", "LR",
        "PC",
    ];
    NAMES[(n & 0xF) as usize]
}

fn register_list(mask: u32) -> String {
    let mut parts = Vec::new();
    let mut i = 0;
    while i < 16 {
        if mask & (1 << i) != 0 {
            let start = i;
            while i + 1 < 16 && mask & (1 << (i + 1)) != 0 {
                i += 1;
            }
            match i - start {
                0 => parts.push(reg(start).to_string()),
                1 => {
                    parts.push(reg(start).to_string());
                    parts.push(reg(i).to_string());
                }
                _ => parts.push(format!("{}-{}", reg(start), reg(i))),
            }
        }
        i += 1;
    }
    format!("{{{}}}", parts.join(","))
}

/// Second operand of a data-processing instruction
fn shifter_operand(word: u32) -> String {
    if word & (1 << 25) != 0 {
        let rotate = ((word >> 8) & 0xF) * 2;
        let value = (word & 0xFF).rotate_right(rotate);
        return format!("#0x{:X}", value);
    }
    let rm = reg(word & 0xF);
    let shift = SHIFTS[((word >> 5) & 3) as usize];
    if word & (1 << 4) != 0 {
        return format!("{},{} {}", rm, shift, reg((word >> 8) & 0xF));
    }
    match (word >> 7) & 0x1F {
        0 if (word >> 5) & 3 == 0 => rm.to_string(),
        0 if (word >> 5) & 3 == 3 => format!("{},RRX", rm),
        amount => format!("{},{} #{}", rm, shift, if amount == 0 { 32 } else { amount }),
    }
}

fn decode(word: u32, address: u32) -> Option<(String, String)> {
    let cond = CONDITIONS[(word >> 28) as usize];
    if word >> 28 == 0xF {
        return None;
    }

    // BX / BLX register
    if word & 0x0FFF_FFD0 == 0x012F_FF10 {
        let name = if word & 0x20 != 0 { "BLX" } else { "BX" };
        return Some((format!("{}{}", name, cond), reg(word & 0xF).to_string()));
    }

    match (word >> 25) & 7 {
        0b101 => {
            let link = word & (1 << 24) != 0;
            let offset = (((word & 0x00FF_FFFF) << 8) as i32) >> 6;
            let target = operand::offset(address.wrapping_add(8), offset);
            let name = if link { "BL" } else { "B" };
            Some((format!("{}{}", name, cond), hex32(target)))
        }
        0b111 if word & (1 << 24) != 0 => Some((
            format!("SWI{}", cond),
            format!("#0x{:X}", word & 0x00FF_FFFF),
        )),
        0b100 => {
            let load = word & (1 << 20) != 0;
            let writeback = if word & (1 << 21) != 0 { "!" } else { "" };
            let mode = match (word >> 23) & 3 {
                0 => "DA",
                1 => "IA",
                2 => "DB",
                _ => "IB",
            };
            let rn = (word >> 16) & 0xF;
            let list = register_list(word & 0xFFFF);
            if rn == 13 && writeback == "!" {
                // stack idioms
                if load && mode == "IA" {
                    return Some((format!("POP{}", cond), list));
                }
                if !load && mode == "DB" {
                    return Some((format!("PUSH{}", cond), list));
                }
            }
            let name = if load { "LDM" } else { "STM" };
            Some((
                format!("{}{}{}", name, cond, mode),
                format!("{}{},{}", reg(rn), writeback, list),
            ))
        }
        0b010 | 0b011 => {
            if (word >> 25) & 1 == 1 && word & 0x10 != 0 {
                return None;
            }
            let load = word & (1 << 20) != 0;
            let byte = if word & (1 << 22) != 0 { "B" } else { "" };
            let pre = word & (1 << 24) != 0;
            let up = word & (1 << 23) != 0;
            let writeback = word & (1 << 21) != 0;
            let rd = reg((word >> 12) & 0xF);
            let rn = reg((word >> 16) & 0xF);
            let sign = if up { "" } else { "-" };
            let offset = if (word >> 25) & 1 == 0 {
                let imm = word & 0xFFF;
                if imm == 0 {
                    String::new()
                } else {
                    format!(",#{}0x{:X}", sign, imm)
                }
            } else {
                format!(",{}{}", sign, shifter_operand(word & !(1 << 25)))
            };
            let addressing = if pre {
                format!("[{}{}]{}", rn, offset, if writeback { "!" } else { "" })
            } else {
                format!("[{}]{}", rn, offset)
            };
            let name = if load { "LDR" } else { "STR" };
            Some((format!("{}{}{}", name, cond, byte), format!("{},{}", rd, addressing)))
        }
        0b000 if word & 0x0FC0_00F0 == 0x0000_0090 => {
            let accumulate = word & (1 << 21) != 0;
            let s = if word & (1 << 20) != 0 { "S" } else { "" };
            let rd = reg((word >> 16) & 0xF);
            let rm = reg(word & 0xF);
            let rs = reg((word >> 8) & 0xF);
            if accumulate {
                let rn = reg((word >> 12) & 0xF);
                Some((format!("MLA{}{}", cond, s), format!("{},{},{},{}", rd, rm, rs, rn)))
            } else {
                Some((format!("MUL{}{}", cond, s), format!("{},{},{}", rd, rm, rs)))
            }
        }
        0b000 | 0b001 => {
            if (word >> 25) & 1 == 0 && word & 0x90 == 0x90 {
                return None; // halfword transfers, swaps
            }
            let opcode = ((word >> 21) & 0xF) as usize;
            let set_flags = word & (1 << 20) != 0;
            let name = DATA_OPS[opcode];
            let rd = reg((word >> 12) & 0xF);
            let rn = reg((word >> 16) & 0xF);
            let op2 = shifter_operand(word);
            match opcode {
                8..=11 => {
                    if !set_flags {
                        return None; // MRS/MSR space
                    }
                    Some((format!("{}{}", name, cond), format!("{},{}", rn, op2)))
                }
                13 | 15 => {
                    let s = if set_flags { "S" } else { "" };
                    Some((format!("{}{}{}", name, cond, s), format!("{},{}", rd, op2)))
                }
                _ => {
                    let s = if set_flags { "S" } else { "" };
                    Some((format!("{}{}{}", name, cond, s), format!("{},{},{}", rd, rn, op2)))
                }
            }
        }
        _ => None,
    }
}

/// Strip a trailing condition code, returning the base mnemonic
fn base_mnemonic(mnemonic: &str) -> &str {
    if mnemonic.len() > 2 {
        let (head, tail) = mnemonic.split_at(mnemonic.len() - 2);
        if CONDITIONS.contains(&tail) {
            return head;
        }
    }
    mnemonic
}

/// ARM core (32-bit instruction set)
#[derive(Debug, Default, Clone, Copy)]
pub struct ArmCore;

impl ArmCore {
    pub fn new() -> Self {
        Self
    }
}

impl CpuCore for ArmCore {
    fn architecture(&self) -> Architecture {
        Architecture::ARM
    }

    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction {
        let word = self.architecture().endianness().read_value(read, address, 4) as u32;
        match decode(word, address) {
            Some((mnemonic, operands)) => {
                let cycles = if mnemonic.starts_with('B') { 3 } else { 1 };
                Instruction::decoded(address, mnemonic, operands, 4, cycles, read)
            }
            None => Instruction::decoded(address, "DCD", hex32(word), 4, 1, read),
        }
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool {
        matches!(base_mnemonic(&insn.mnemonic), "BL" | "BLX")
    }

    fn is_return_instruction(&self, insn: &Instruction) -> bool {
        let base = base_mnemonic(&insn.mnemonic);
        match base {
            "BX" => insn.operands == "LR",
            "MOV" => insn.operands == "PC,LR",
            "POP" => insn.operands.contains("PC"),
            _ => base.starts_with("LDM") && insn.operands.contains("PC}"),
        }
    }

    fn is_jump_instruction(&self, insn: &Instruction) -> bool {
        match base_mnemonic(&insn.mnemonic) {
            "B" => true,
            "BX" => insn.operands != "LR",
            _ => false,
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
