//! Motorola 68000 decoder
//!
//! Covers control flow completely (Bcc/BRA/BSR with 8, 16 and 32-bit
//! displacements, DBcc, JSR/JMP over every control addressing mode,
//! RTS/RTE/RTR, TRAP) and the common data-movement and ALU encodings.
//! Opcode words are big-endian.

use rd_core::{Architecture, Endianness};

use crate::cpu_core::{CpuCore, Instruction};
use crate::operand::{self, hex16, hex32, hex8, signed_hex};

const CONDITIONS: [&str; 16] = [
    "T", "F", "HI", "LS", "CC", "CS", "NE", "EQ", "VC", "VS", "PL", "MI", "GE", "LT", "GT", "LE",
];

const BIT_OPS: [&str; 4] = ["BTST", "BCHG", "BCLR", "BSET"];

const SHIFTS: [&str; 4] = ["AS", "LS", "ROX", "RO"];

static REGISTER_NAMES: [&str; 20] = [
    "D0", "D1", "D2", "D3", "D4", "D5", "D6", "D7", "A0", "A1", "A2", "A3", "A4", "A5", "A6", "A7",
    "PC", "SR", "USP", "SSP",
];

/// Operation size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    /// Standard two-bit size field (bits 7-6)
    fn from_bits(bits: u16) -> Option<Self> {
        match bits {
            0 => Some(Self::Byte),
            1 => Some(Self::Word),
            2 => Some(Self::Long),
            _ => None,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            Self::Byte => ".B",
            Self::Word => ".W",
            Self::Long => ".L",
        }
    }
}

type Decoded = Option<(String, String, u32)>;

fn ok(mnemonic: impl Into<String>, operands: impl Into<String>, cycles: u32) -> Decoded {
    Some((mnemonic.into(), operands.into(), cycles))
}

/// Fetches extension words following the opcode
struct Cursor<'a> {
    read: &'a dyn Fn(u32) -> u8,
    pc: u32,
}

impl<'a> Cursor<'a> {
    fn word(&mut self) -> u16 {
        let value = Endianness::Big.read_value(self.read, self.pc, 2) as u16;
        self.pc = self.pc.wrapping_add(2);
        value
    }

    fn long(&mut self) -> u32 {
        let value = Endianness::Big.read_value(self.read, self.pc, 4) as u32;
        self.pc = self.pc.wrapping_add(4);
        value
    }

    fn immediate(&mut self, size: Size) -> String {
        match size {
            Size::Byte => format!("#{}", hex8(self.word() as u8)),
            Size::Word => format!("#{}", hex16(self.word())),
            Size::Long => format!("#{}", hex32(self.long())),
        }
    }

    /// Effective address text; `None` for reserved mode/register combinations
    fn ea(&mut self, mode: u16, reg: u16, size: Size) -> Option<String> {
        let text = match mode {
            0 => format!("D{}", reg),
            1 => format!("A{}", reg),
            2 => format!("(A{})", reg),
            3 => format!("(A{})+", reg),
            4 => format!("-(A{})", reg),
            5 => {
                let disp = self.word() as i16 as i32;
                format!("{}(A{})", signed_hex(disp), reg)
            }
            6 => {
                let ext = self.word();
                format!(
                    "{}(A{},{})",
                    signed_hex(ext as u8 as i8 as i32),
                    reg,
                    index_register(ext)
                )
            }
            7 => match reg {
                0 => format!("{}.W", hex16(self.word())),
                1 => hex32(self.long()),
                2 => {
                    let base = self.pc;
                    let disp = self.word() as i16 as i32;
                    format!("{}(PC)", hex32(operand::offset(base, disp)))
                }
                3 => {
                    let ext = self.word();
                    format!(
                        "{}(PC,{})",
                        signed_hex(ext as u8 as i8 as i32),
                        index_register(ext)
                    )
                }
                4 => self.immediate(size),
                _ => return None,
            },
            _ => return None,
        };
        Some(text)
    }
}

fn index_register(ext: u16) -> String {
    format!(
        "{}{}.{}",
        if ext & 0x8000 != 0 { 'A' } else { 'D' },
        (ext >> 12) & 7,
        if ext & 0x0800 != 0 { 'L' } else { 'W' }
    )
}

/// MOVEM register mask as `D0-D3/A6`; predecrement masks are bit-reversed
fn register_list(mask: u16, predecrement: bool) -> String {
    let mask = if predecrement { mask.reverse_bits() } else { mask };
    let mut parts = Vec::new();
    for (bank, prefix) in [(0u16, 'D'), (8u16, 'A')] {
        let mut i = 0u16;
        while i < 8 {
            if mask & (1 << (bank + i)) != 0 {
                let start = i;
                while i + 1 < 8 && mask & (1 << (bank + i + 1)) != 0 {
                    i += 1;
                }
                if start == i {
                    parts.push(format!("{}{}", prefix, start));
                } else {
                    parts.push(format!("{}{}-{}{}", prefix, start, prefix, i));
                }
            }
            i += 1;
        }
    }
    parts.join("/")
}

fn is_conditional_branch(mnemonic: &str) -> bool {
    mnemonic == "BRA"
        || (mnemonic.len() == 3
            && mnemonic.starts_with('B')
            && CONDITIONS[2..].contains(&&mnemonic[1..]))
}

fn decode(c: &mut Cursor<'_>, address: u32) -> Decoded {
    let op = c.word();
    match op >> 12 {
        0x0 => decode_immediate(c, op),
        0x1..=0x3 => decode_move(c, op),
        0x4 => decode_misc(c, op),
        0x5 => decode_quick(c, op),
        0x6 => decode_branch(c, op, address),
        0x7 if op & 0x0100 == 0 => ok(
            "MOVEQ",
            format!("#{},D{}", op as u8 as i8, (op >> 9) & 7),
            4,
        ),
        0x8 | 0xC => decode_logic(c, op),
        0x9 | 0xD => decode_arith(c, op),
        0xB => decode_compare(c, op),
        0xE => decode_shift(c, op),
        _ => None,
    }
}

fn decode_immediate(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let mode = (op >> 3) & 7;
    let reg = op & 7;

    if op & 0x0100 != 0 {
        if mode == 1 {
            return None; // MOVEP
        }
        let ea = c.ea(mode, reg, Size::Byte)?;
        let name = BIT_OPS[((op >> 6) & 3) as usize];
        return ok(name, format!("D{},{}", (op >> 9) & 7, ea), 6);
    }

    let kind = (op >> 9) & 7;
    if kind == 4 {
        let bit = c.word() & 0xFF;
        let ea = c.ea(mode, reg, Size::Byte)?;
        let name = BIT_OPS[((op >> 6) & 3) as usize];
        return ok(name, format!("#{},{}", bit, ea), 10);
    }

    let name = match kind {
        0 => "ORI",
        1 => "ANDI",
        2 => "SUBI",
        3 => "ADDI",
        5 => "EORI",
        6 => "CMPI",
        _ => return None,
    };

    // #imm,CCR and #imm,SR reuse the immediate addressing slot
    if op & 0x3F == 0x3C && matches!(kind, 0 | 1 | 5) {
        return match (op >> 6) & 3 {
            0 => ok(name, format!("#{},CCR", hex8(c.word() as u8)), 20),
            1 => ok(name, format!("#{},SR", hex16(c.word())), 20),
            _ => None,
        };
    }

    let size = Size::from_bits((op >> 6) & 3)?;
    let imm = c.immediate(size);
    let ea = c.ea(mode, reg, size)?;
    ok(format!("{}{}", name, size.suffix()), format!("{},{}", imm, ea), 8)
}

fn decode_move(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let size = match op >> 12 {
        1 => Size::Byte,
        3 => Size::Word,
        _ => Size::Long,
    };
    let src = c.ea((op >> 3) & 7, op & 7, size)?;
    let dst_mode = (op >> 6) & 7;
    let dst_reg = (op >> 9) & 7;

    if dst_mode == 1 {
        if size == Size::Byte {
            return None;
        }
        return ok(
            format!("MOVEA{}", size.suffix()),
            format!("{},A{}", src, dst_reg),
            4,
        );
    }
    if dst_mode == 7 && dst_reg > 1 {
        return None;
    }
    let dst = c.ea(dst_mode, dst_reg, size)?;
    ok(format!("MOVE{}", size.suffix()), format!("{},{}", src, dst), 4)
}

fn decode_misc(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let mode = (op >> 3) & 7;
    let reg = op & 7;
    let reg9 = (op >> 9) & 7;

    match op {
        0x4AFC => return ok("ILLEGAL", "", 34),
        0x4E70 => return ok("RESET", "", 132),
        0x4E71 => return ok("NOP", "", 4),
        0x4E72 => return ok("STOP", format!("#{}", hex16(c.word())), 4),
        0x4E73 => return ok("RTE", "", 20),
        0x4E75 => return ok("RTS", "", 16),
        0x4E76 => return ok("TRAPV", "", 4),
        0x4E77 => return ok("RTR", "", 20),
        _ => {}
    }

    match op & 0xFFF8 {
        0x4E40 | 0x4E48 => return ok("TRAP", format!("#{}", op & 0xF), 34),
        0x4E50 => {
            let disp = c.word() as i16 as i32;
            return ok("LINK", format!("A{},#{}", reg, signed_hex(disp)), 16);
        }
        0x4E58 => return ok("UNLK", format!("A{}", reg), 12),
        0x4E60 => return ok("MOVE", format!("A{},USP", reg), 4),
        0x4E68 => return ok("MOVE", format!("USP,A{}", reg), 4),
        0x4840 => return ok("SWAP", format!("D{}", reg), 4),
        0x4880 => return ok("EXT.W", format!("D{}", reg), 4),
        0x48C0 => return ok("EXT.L", format!("D{}", reg), 4),
        _ => {}
    }

    match op & 0xFFC0 {
        0x4E80 => return ok("JSR", c.ea(mode, reg, Size::Long)?, 16),
        0x4EC0 => return ok("JMP", c.ea(mode, reg, Size::Long)?, 8),
        0x4840 => return ok("PEA", c.ea(mode, reg, Size::Long)?, 12),
        0x40C0 => return ok("MOVE", format!("SR,{}", c.ea(mode, reg, Size::Word)?), 6),
        0x44C0 => return ok("MOVE", format!("{},CCR", c.ea(mode, reg, Size::Word)?), 12),
        0x46C0 => return ok("MOVE", format!("{},SR", c.ea(mode, reg, Size::Word)?), 12),
        0x4AC0 => return ok("TAS", c.ea(mode, reg, Size::Byte)?, 4),
        _ => {}
    }

    if op & 0xFB80 == 0x4880 {
        if mode < 2 {
            return None;
        }
        let to_registers = op & 0x0400 != 0;
        let size = if op & 0x0040 != 0 { Size::Long } else { Size::Word };
        let mask = c.word();
        let ea = c.ea(mode, reg, size)?;
        let list = register_list(mask, mode == 4);
        let operands = if to_registers {
            format!("{},{}", ea, list)
        } else {
            format!("{},{}", list, ea)
        };
        return ok(format!("MOVEM{}", size.suffix()), operands, 12);
    }

    if op & 0xF1C0 == 0x41C0 {
        let ea = c.ea(mode, reg, Size::Long)?;
        return ok("LEA", format!("{},A{}", ea, reg9), 4);
    }
    if op & 0xF1C0 == 0x4180 {
        let ea = c.ea(mode, reg, Size::Word)?;
        return ok("CHK.W", format!("{},D{}", ea, reg9), 10);
    }

    let name = match (op >> 8) & 0xF {
        0x0 => "NEGX",
        0x2 => "CLR",
        0x4 => "NEG",
        0x6 => "NOT",
        0xA => "TST",
        _ => return None,
    };
    let size = Size::from_bits((op >> 6) & 3)?;
    let ea = c.ea(mode, reg, size)?;
    ok(format!("{}{}", name, size.suffix()), ea, 4)
}

fn decode_quick(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let mode = (op >> 3) & 7;
    let reg = op & 7;
    let size_bits = (op >> 6) & 3;

    if size_bits == 3 {
        let cond = ((op >> 8) & 0xF) as usize;
        if mode == 1 {
            let base = c.pc;
            let disp = c.word() as i16 as i32;
            let name = if cond == 1 {
                "DBRA".to_string()
            } else {
                format!("DB{}", CONDITIONS[cond])
            };
            return ok(
                name,
                format!("D{},{}", reg, hex32(operand::offset(base, disp))),
                10,
            );
        }
        let ea = c.ea(mode, reg, Size::Byte)?;
        return ok(format!("S{}", CONDITIONS[cond]), ea, 4);
    }

    let size = Size::from_bits(size_bits)?;
    let data = match (op >> 9) & 7 {
        0 => 8,
        n => n,
    };
    let name = if op & 0x0100 != 0 { "SUBQ" } else { "ADDQ" };
    let ea = c.ea(mode, reg, size)?;
    ok(format!("{}{}", name, size.suffix()), format!("#{},{}", data, ea), 4)
}

fn decode_branch(c: &mut Cursor<'_>, op: u16, address: u32) -> Decoded {
    let cond = ((op >> 8) & 0xF) as usize;
    let base = address.wrapping_add(2);
    let disp = match op as u8 {
        0x00 => c.word() as i16 as i32,
        0xFF => c.long() as i32,
        d => d as i8 as i32,
    };
    let (name, cycles) = match cond {
        0 => ("BRA".to_string(), 10),
        1 => ("BSR".to_string(), 18),
        _ => (format!("B{}", CONDITIONS[cond]), 10),
    };
    ok(name, hex32(operand::offset(base, disp)), cycles)
}

/// ADD/SUB family (lines 0xD and 0x9)
fn decode_arith(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let name = if op >> 12 == 0xD { "ADD" } else { "SUB" };
    let mode = (op >> 3) & 7;
    let reg = op & 7;
    let reg9 = (op >> 9) & 7;
    let opmode = (op >> 6) & 7;

    match opmode {
        0..=2 => {
            let size = Size::from_bits(opmode)?;
            let ea = c.ea(mode, reg, size)?;
            ok(format!("{}{}", name, size.suffix()), format!("{},D{}", ea, reg9), 4)
        }
        3 | 7 => {
            let size = if opmode == 3 { Size::Word } else { Size::Long };
            let ea = c.ea(mode, reg, size)?;
            ok(format!("{}A{}", name, size.suffix()), format!("{},A{}", ea, reg9), 8)
        }
        _ => {
            let size = Size::from_bits(opmode - 4)?;
            match mode {
                0 => ok(format!("{}X{}", name, size.suffix()), format!("D{},D{}", reg, reg9), 4),
                1 => ok(
                    format!("{}X{}", name, size.suffix()),
                    format!("-(A{}),-(A{})", reg, reg9),
                    18,
                ),
                _ => {
                    let ea = c.ea(mode, reg, size)?;
                    ok(format!("{}{}", name, size.suffix()), format!("D{},{}", reg9, ea), 8)
                }
            }
        }
    }
}

/// OR/DIV (line 0x8) and AND/MUL/EXG/ABCD (line 0xC)
fn decode_logic(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let is_and = op >> 12 == 0xC;
    let name = if is_and { "AND" } else { "OR" };
    let mode = (op >> 3) & 7;
    let reg = op & 7;
    let reg9 = (op >> 9) & 7;
    let opmode = (op >> 6) & 7;

    match opmode {
        0..=2 => {
            let size = Size::from_bits(opmode)?;
            let ea = c.ea(mode, reg, size)?;
            ok(format!("{}{}", name, size.suffix()), format!("{},D{}", ea, reg9), 4)
        }
        3 | 7 => {
            let signed = opmode == 7;
            let op_name = match (is_and, signed) {
                (true, false) => "MULU.W",
                (true, true) => "MULS.W",
                (false, false) => "DIVU.W",
                (false, true) => "DIVS.W",
            };
            let ea = c.ea(mode, reg, Size::Word)?;
            ok(op_name, format!("{},D{}", ea, reg9), if is_and { 70 } else { 140 })
        }
        _ => match (is_and, opmode, mode) {
            (_, 4, 0) => ok(
                if is_and { "ABCD" } else { "SBCD" },
                format!("D{},D{}", reg, reg9),
                6,
            ),
            (_, 4, 1) => ok(
                if is_and { "ABCD" } else { "SBCD" },
                format!("-(A{}),-(A{})", reg, reg9),
                18,
            ),
            (true, 5, 0) => ok("EXG", format!("D{},D{}", reg9, reg), 6),
            (true, 5, 1) => ok("EXG", format!("A{},A{}", reg9, reg), 6),
            (true, 6, 1) => ok("EXG", format!("D{},A{}", reg9, reg), 6),
            (_, _, 0) | (_, _, 1) => None,
            _ => {
                let size = Size::from_bits(opmode - 4)?;
                let ea = c.ea(mode, reg, size)?;
                ok(format!("{}{}", name, size.suffix()), format!("D{},{}", reg9, ea), 8)
            }
        },
    }
}

/// CMP/CMPA/CMPM/EOR (line 0xB)
fn decode_compare(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let mode = (op >> 3) & 7;
    let reg = op & 7;
    let reg9 = (op >> 9) & 7;
    let opmode = (op >> 6) & 7;

    match opmode {
        0..=2 => {
            let size = Size::from_bits(opmode)?;
            let ea = c.ea(mode, reg, size)?;
            ok(format!("CMP{}", size.suffix()), format!("{},D{}", ea, reg9), 4)
        }
        3 | 7 => {
            let size = if opmode == 3 { Size::Word } else { Size::Long };
            let ea = c.ea(mode, reg, size)?;
            ok(format!("CMPA{}", size.suffix()), format!("{},A{}", ea, reg9), 6)
        }
        _ => {
            let size = Size::from_bits(opmode - 4)?;
            if mode == 1 {
                return ok(
                    format!("CMPM{}", size.suffix()),
                    format!("(A{})+,(A{})+", reg, reg9),
                    12,
                );
            }
            let ea = c.ea(mode, reg, size)?;
            ok(format!("EOR{}", size.suffix()), format!("D{},{}", reg9, ea), 8)
        }
    }
}

fn decode_shift(c: &mut Cursor<'_>, op: u16) -> Decoded {
    let dir = if op & 0x0100 != 0 { 'L' } else { 'R' };
    let size_bits = (op >> 6) & 3;

    if size_bits == 3 {
        let kind = ((op >> 9) & 3) as usize;
        let ea = c.ea((op >> 3) & 7, op & 7, Size::Word)?;
        return ok(format!("{}{}", SHIFTS[kind], dir), ea, 8);
    }

    let size = Size::from_bits(size_bits)?;
    let kind = ((op >> 3) & 3) as usize;
    let reg9 = (op >> 9) & 7;
    let count = if op & 0x0020 != 0 {
        format!("D{}", reg9)
    } else {
        format!("#{}", if reg9 == 0 { 8 } else { reg9 })
    };
    ok(
        format!("{}{}{}", SHIFTS[kind], dir, size.suffix()),
        format!("{},D{}", count, op & 7),
        6,
    )
}

/// Motorola 68000 core
#[derive(Debug, Default, Clone, Copy)]
pub struct M68kCore;

impl M68kCore {
    pub fn new() -> Self {
        Self
    }
}

impl CpuCore for M68kCore {
    fn architecture(&self) -> Architecture {
        Architecture::M68K
    }

    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction {
        let mut cursor = Cursor { read, pc: address };
        match decode(&mut cursor, address) {
            Some((mnemonic, operands, cycles)) => {
                let size = cursor.pc.wrapping_sub(address);
                Instruction::decoded(address, mnemonic, operands, size, cycles, read)
            }
            None => {
                let word = Endianness::Big.read_value(read, address, 2) as u16;
                Instruction::decoded(address, "DC.W", hex16(word), 2, 0, read)
            }
        }
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "JSR" | "BSR")
    }

    fn is_return_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "RTS" | "RTE" | "RTR")
    }

    fn is_jump_instruction(&self, insn: &Instruction) -> bool {
        let m = insn.mnemonic.as_str();
        m == "JMP" || m.starts_with("DB") || is_conditional_branch(m)
    }

    fn branch_target_address(&self, insn: &Instruction) -> u32 {
        let field = operand::last_field(&insn.operands);
        let field = field.strip_suffix("(PC)").unwrap_or(field);
        if let Some(short) = field.strip_suffix(".W") {
            // absolute short addresses are sign-extended
            return operand::parse_hex_literal(short)
                .map(|v| v as u16 as i16 as i32 as u32)
                .unwrap_or(0);
        }
        operand::parse_hex_literal(field).unwrap_or(0)
    }

    fn register_names(&self) -> &'static [&'static str] {
        &REGISTER_NAMES
    }

    fn min_instruction_size(&self) -> u32 {
        2
    }

    fn max_instruction_size(&self) -> u32 {
        10
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
        M68kCore::new().disassemble_instruction(address, &read)
    }

    #[test]
    fn test_nop_and_returns() {
        let core = M68kCore::new();
        let nop = decode_bytes(0x1000, &[0x4E, 0x71]);
        assert_eq!(nop.mnemonic, "NOP");
        assert_eq!(nop.size, 2);

        for (bytes, name) in [([0x4E, 0x75], "RTS"), ([0x4E, 0x73], "RTE"), ([0x4E, 0x77], "RTR")] {
            let insn = decode_bytes(0, &bytes);
            assert_eq!(insn.mnemonic, name);
            assert!(core.is_return_instruction(&insn));
        }
    }

    #[test]
    fn test_short_branch_target() {
        let core = M68kCore::new();
        let bra = decode_bytes(0x1000, &[0x60, 0x0E]);
        assert_eq!(bra.mnemonic, "BRA");
        assert_eq!(bra.operands, "$00001010");
        assert_eq!(bra.size, 2);
        assert!(core.is_jump_instruction(&bra));
        assert_eq!(core.branch_target_address(&bra), 0x1010);

        let bne = decode_bytes(0x1000, &[0x66, 0xFC]);
        assert_eq!(bne.mnemonic, "BNE");
        assert_eq!(core.branch_target_address(&bne), 0x0FFE);
    }

    #[test]
    fn test_word_branch_and_bsr() {
        let core = M68kCore::new();
        let bsr = decode_bytes(0x2000, &[0x61, 0x00, 0x01, 0x00]);
        assert_eq!(bsr.mnemonic, "BSR");
        assert_eq!(bsr.size, 4);
        assert!(core.is_call_instruction(&bsr));
        assert!(!core.is_jump_instruction(&bsr));
        assert_eq!(core.branch_target_address(&bsr), 0x2102);
    }

    #[test]
    fn test_jsr_absolute_long() {
        let core = M68kCore::new();
        let jsr = decode_bytes(0x400, &[0x4E, 0xB9, 0x00, 0xFF, 0x10, 0x00]);
        assert_eq!(jsr.mnemonic, "JSR");
        assert_eq!(jsr.operands, "$00FF1000");
        assert_eq!(jsr.size, 6);
        assert_eq!(jsr.bytes, vec![0x4E, 0xB9, 0x00, 0xFF, 0x10, 0x00]);
        assert!(core.is_call_instruction(&jsr));
        assert_eq!(core.branch_target_address(&jsr), 0x00FF_1000);
    }

    #[test]
    fn test_jsr_indirect_has_no_target() {
        let core = M68kCore::new();
        let jsr = decode_bytes(0, &[0x4E, 0x90]);
        assert_eq!(jsr.text(), "JSR (A0)");
        assert_eq!(core.branch_target_address(&jsr), 0);
    }

    #[test]
    fn test_jmp_pc_relative_and_short() {
        let core = M68kCore::new();
        let jmp = decode_bytes(0x1000, &[0x4E, 0xFA, 0x00, 0x10]);
        assert_eq!(jmp.operands, "$00001012(PC)");
        assert_eq!(core.branch_target_address(&jmp), 0x1012);

        let jmp = decode_bytes(0, &[0x4E, 0xF8, 0x80, 0x00]);
        assert_eq!(jmp.operands, "$8000.W");
        assert_eq!(core.branch_target_address(&jmp), 0xFFFF_8000);
    }

    #[test]
    fn test_dbra() {
        let core = M68kCore::new();
        let dbra = decode_bytes(0x1000, &[0x51, 0xC8, 0xFF, 0xFC]);
        assert_eq!(dbra.mnemonic, "DBRA");
        assert_eq!(dbra.operands, "D0,$00000FFE");
        assert!(core.is_jump_instruction(&dbra));
        assert_eq!(core.branch_target_address(&dbra), 0x0FFE);
    }

    #[test]
    fn test_moves() {
        let insn = decode_bytes(0, &[0x70, 0xFF]);
        assert_eq!(insn.text(), "MOVEQ #-1,D0");

        // MOVE.L #$12345678,D1
        let insn = decode_bytes(0, &[0x22, 0x3C, 0x12, 0x34, 0x56, 0x78]);
        assert_eq!(insn.text(), "MOVE.L #$12345678,D1");
        assert_eq!(insn.size, 6);

        // MOVE.W D0,$10(A6)
        let insn = decode_bytes(0, &[0x3D, 0x40, 0x00, 0x10]);
        assert_eq!(insn.text(), "MOVE.W D0,$10(A6)");

        // MOVEA.L (A7)+,A0
        let insn = decode_bytes(0, &[0x20, 0x5F]);
        assert_eq!(insn.text(), "MOVEA.L (A7)+,A0");
    }

    #[test]
    fn test_movem_and_link() {
        // MOVEM.L D0-D3/A6,-(A7)
        let insn = decode_bytes(0, &[0x48, 0xE7, 0xF0, 0x02]);
        assert_eq!(insn.text(), "MOVEM.L D0-D3/A6,-(A7)");
        assert_eq!(insn.size, 4);

        // MOVEM.L (A7)+,D0-D3/A6
        let insn = decode_bytes(0, &[0x4C, 0xDF, 0x40, 0x0F]);
        assert_eq!(insn.text(), "MOVEM.L (A7)+,D0-D3/A6");

        let insn = decode_bytes(0, &[0x4E, 0x56, 0xFF, 0xF0]);
        assert_eq!(insn.text(), "LINK A6,#-$10");
        let insn = decode_bytes(0, &[0x4E, 0x5E]);
        assert_eq!(insn.text(), "UNLK A6");
    }

    #[test]
    fn test_alu() {
        assert_eq!(decode_bytes(0, &[0xD0, 0x81]).text(), "ADD.L D1,D0");
        assert_eq!(decode_bytes(0, &[0x53, 0x40]).text(), "SUBQ.W #1,D0");
        assert_eq!(decode_bytes(0, &[0x42, 0x80]).text(), "CLR.L D0");
        assert_eq!(decode_bytes(0, &[0xE3, 0x48]).text(), "LSL.W #1,D0");
        assert_eq!(decode_bytes(0, &[0x4E, 0x4F]).text(), "TRAP #15");
        assert_eq!(decode_bytes(0, &[0xB0, 0x41]).text(), "CMP.W D1,D0");
    }

    #[test]
    fn test_unknown_opcode_advances() {
        let insn = decode_bytes(0, &[0xFF, 0xFF]);
        assert_eq!(insn.mnemonic, "DC.W");
        assert_eq!(insn.operands, "$FFFF");
        assert_eq!(insn.size, 2);
    }

    #[test]
    fn test_btst_is_not_a_branch() {
        let core = M68kCore::new();
        let insn = decode_bytes(0, &[0x08, 0x00, 0x00, 0x03]);
        assert_eq!(insn.text(), "BTST #3,D0");
        assert!(!core.is_jump_instruction(&insn));
    }
}
