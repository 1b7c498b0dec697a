//! Zilog Z80 decoder
//!
//! Opcodes are split into the usual x/y/z/p/q bit fields. The CB, ED, DD
//! and FD prefixes are handled; DD/FD substitute IX/IY for HL and
//! `(IX+d)` for `(HL)`.

use rd_core::Architecture;

use crate::cpu_core::{CpuCore, Instruction};
use crate::operand::{self, hex16, hex8};

const R: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const RP: [&str; 4] = ["BC", "DE", "HL", "SP"];
const RP2: [&str; 4] = ["BC", "DE", "HL", "AF"];
const CC: [&str; 8] = ["NZ", "Z", "NC", "C", "PO", "PE", "P", "M"];
const ROT: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];
const ACC_OPS: [&str; 8] = ["RLCA", "RRCA", "RLA", "RRA", "DAA", "CPL", "SCF", "CCF"];
const IM: [&str; 8] = ["0", "0", "1", "2", "0", "0", "1", "2"];

/// ALU mnemonic and whether it names the accumulator explicitly
const ALU: [(&str, bool); 8] = [
    ("ADD", true),
    ("ADC", true),
    ("SUB", false),
    ("SBC", true),
    ("AND", false),
    ("XOR", false),
    ("OR", false),
    ("CP", false),
];

const BLOCK: [[&str; 4]; 4] = [
    ["LDI", "CPI", "INI", "OUTI"],
    ["LDD", "CPD", "IND", "OUTD"],
    ["LDIR", "CPIR", "INIR", "OTIR"],
    ["LDDR", "CPDR", "INDR", "OTDR"],
];

static REGISTER_NAMES: [&str; 22] = [
    "A", "F", "B", "C", "D", "E", "H", "L", "AF", "BC", "DE", "HL", "AF'", "BC'", "DE'", "HL'",
    "IX", "IY", "SP", "PC", "I", "R",
];

type Decoded = Option<(String, String, u32)>;

fn ok(mnemonic: impl Into<String>, operands: impl Into<String>, cycles: u32) -> Decoded {
    Some((mnemonic.into(), operands.into(), cycles))
}

struct Decoder<'a> {
    read: &'a dyn Fn(u32) -> u8,
    pos: u32,
    /// "IX" or "IY" while decoding a DD/FD-prefixed opcode
    index: Option<&'static str>,
}

impl<'a> Decoder<'a> {
    fn byte(&mut self) -> u8 {
        let b = (self.read)(self.pos);
        self.pos = self.pos.wrapping_add(1);
        b
    }

    fn word(&mut self) -> u16 {
        let lo = self.byte() as u16;
        let hi = self.byte() as u16;
        (hi << 8) | lo
    }

    fn relative(&mut self) -> String {
        let disp = self.byte() as i8 as i32;
        hex16(operand::offset(self.pos, disp) as u16)
    }

    fn indexed(&mut self, ix: &str) -> String {
        let disp = self.byte() as i8;
        if disp < 0 {
            format!("({}-{})", ix, hex8(disp.unsigned_abs()))
        } else {
            format!("({}+{})", ix, hex8(disp as u8))
        }
    }

    /// `r[i]`; with `plain` set H and L are never renamed to IXH/IXL
    fn reg(&mut self, i: u8, plain: bool) -> String {
        match (i, self.index) {
            (6, Some(ix)) => self.indexed(ix),
            (4, Some(ix)) if !plain => format!("{}H", ix),
            (5, Some(ix)) if !plain => format!("{}L", ix),
            _ => R[i as usize].to_string(),
        }
    }

    fn hl(&self) -> &'static str {
        self.index.unwrap_or("HL")
    }

    fn rp(&self, p: u8) -> &'static str {
        if p == 2 {
            self.hl()
        } else {
            RP[p as usize]
        }
    }

    fn rp2(&self, p: u8) -> &'static str {
        if p == 2 {
            self.hl()
        } else {
            RP2[p as usize]
        }
    }

    fn decode(&mut self) -> Decoded {
        let op = self.byte();
        match op {
            0xCB => return self.decode_cb(),
            0xED => return self.decode_ed(),
            0xDD | 0xFD => {
                if self.index.is_some() {
                    return None;
                }
                let next = (self.read)(self.pos);
                if matches!(next, 0xDD | 0xED | 0xFD) {
                    return None;
                }
                self.index = Some(if op == 0xDD { "IX" } else { "IY" });
                return self.decode().map(|(m, o, c)| (m, o, c + 4));
            }
            _ => {}
        }

        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match x {
            0 => self.decode_block0(y, z, p, q),
            1 => {
                if y == 6 && z == 6 {
                    return ok("HALT", "", 4);
                }
                let plain = y == 6 || z == 6;
                let dst = self.reg(y, plain);
                let src = self.reg(z, plain);
                ok("LD", format!("{},{}", dst, src), if plain { 7 } else { 4 })
            }
            2 => {
                let src = self.reg(z, false);
                Self::alu(y, src, 4)
            }
            _ => self.decode_block3(y, z, p, q),
        }
    }

    fn alu(y: u8, src: String, cycles: u32) -> Decoded {
        let (name, explicit_a) = ALU[y as usize];
        if explicit_a {
            ok(name, format!("A,{}", src), cycles)
        } else {
            ok(name, src, cycles)
        }
    }

    fn decode_block0(&mut self, y: u8, z: u8, p: u8, q: u8) -> Decoded {
        match z {
            0 => match y {
                0 => ok("NOP", "", 4),
                1 => ok("EX", "AF,AF'", 4),
                2 => ok("DJNZ", self.relative(), 13),
                3 => ok("JR", self.relative(), 12),
                _ => {
                    let target = self.relative();
                    ok("JR", format!("{},{}", CC[(y - 4) as usize], target), 12)
                }
            },
            1 => {
                if q == 0 {
                    let nn = self.word();
                    ok("LD", format!("{},{}", self.rp(p), hex16(nn)), 10)
                } else {
                    ok("ADD", format!("{},{}", self.hl(), self.rp(p)), 11)
                }
            }
            2 => {
                let (dst, src, cycles) = match (p, q) {
                    (0, 0) => ("(BC)".to_string(), "A".to_string(), 7),
                    (1, 0) => ("(DE)".to_string(), "A".to_string(), 7),
                    (2, 0) => (format!("({})", hex16(self.word())), self.hl().to_string(), 16),
                    (3, 0) => (format!("({})", hex16(self.word())), "A".to_string(), 13),
                    (0, _) => ("A".to_string(), "(BC)".to_string(), 7),
                    (1, _) => ("A".to_string(), "(DE)".to_string(), 7),
                    (2, _) => (self.hl().to_string(), format!("({})", hex16(self.word())), 16),
                    _ => ("A".to_string(), format!("({})", hex16(self.word())), 13),
                };
                ok("LD", format!("{},{}", dst, src), cycles)
            }
            3 => ok(if q == 0 { "INC" } else { "DEC" }, self.rp(p), 6),
            4 => ok("INC", self.reg(y, false), 4),
            5 => ok("DEC", self.reg(y, false), 4),
            6 => {
                let dst = self.reg(y, false);
                let n = self.byte();
                ok("LD", format!("{},{}", dst, hex8(n)), 7)
            }
            _ => ok(ACC_OPS[y as usize], "", 4),
        }
    }

    fn decode_block3(&mut self, y: u8, z: u8, p: u8, q: u8) -> Decoded {
        match z {
            0 => ok("RET", CC[y as usize], 11),
            1 => {
                if q == 0 {
                    return ok("POP", self.rp2(p), 10);
                }
                match p {
                    0 => ok("RET", "", 10),
                    1 => ok("EXX", "", 4),
                    2 => ok("JP", format!("({})", self.hl()), 4),
                    _ => ok("LD", format!("SP,{}", self.hl()), 6),
                }
            }
            2 => {
                let nn = self.word();
                ok("JP", format!("{},{}", CC[y as usize], hex16(nn)), 10)
            }
            3 => match y {
                0 => ok("JP", hex16(self.word()), 10),
                2 => ok("OUT", format!("({}),A", hex8(self.byte())), 11),
                3 => ok("IN", format!("A,({})", hex8(self.byte())), 11),
                4 => ok("EX", format!("(SP),{}", self.hl()), 19),
                5 => ok("EX", "DE,HL", 4),
                6 => ok("DI", "", 4),
                7 => ok("EI", "", 4),
                _ => None,
            },
            4 => {
                let nn = self.word();
                ok("CALL", format!("{},{}", CC[y as usize], hex16(nn)), 17)
            }
            5 => {
                if q == 0 {
                    ok("PUSH", self.rp2(p), 11)
                } else if p == 0 {
                    ok("CALL", hex16(self.word()), 17)
                } else {
                    None
                }
            }
            6 => {
                let n = self.byte();
                Self::alu(y, hex8(n), 7)
            }
            _ => ok("RST", hex8(y * 8), 11),
        }
    }

    fn decode_cb(&mut self) -> Decoded {
        // DD CB d op: the displacement precedes the opcode
        let target = match self.index {
            Some(ix) => Some(self.indexed(ix)),
            None => None,
        };
        let op = self.byte();
        let y = (op >> 3) & 7;
        let z = op & 7;
        let (operand, cycles) = match target {
            Some(mem) => (mem, 23),
            None => (R[z as usize].to_string(), if z == 6 { 15 } else { 8 }),
        };
        match op >> 6 {
            0 => ok(ROT[y as usize], operand, cycles),
            1 => ok("BIT", format!("{},{}", y, operand), cycles),
            2 => ok("RES", format!("{},{}", y, operand), cycles),
            _ => ok("SET", format!("{},{}", y, operand), cycles),
        }
    }

    fn decode_ed(&mut self) -> Decoded {
        let op = self.byte();
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = y >> 1;
        let q = y & 1;

        match x {
            1 => match z {
                0 if y == 6 => ok("IN", "(C)", 12),
                0 => ok("IN", format!("{},(C)", R[y as usize]), 12),
                1 if y == 6 => ok("OUT", "(C),0", 12),
                1 => ok("OUT", format!("(C),{}", R[y as usize]), 12),
                2 => ok(
                    if q == 0 { "SBC" } else { "ADC" },
                    format!("HL,{}", RP[p as usize]),
                    15,
                ),
                3 => {
                    let nn = hex16(self.word());
                    if q == 0 {
                        ok("LD", format!("({}),{}", nn, RP[p as usize]), 20)
                    } else {
                        ok("LD", format!("{},({})", RP[p as usize], nn), 20)
                    }
                }
                4 => ok("NEG", "", 8),
                5 => ok(if y == 1 { "RETI" } else { "RETN" }, "", 14),
                6 => ok("IM", IM[y as usize], 8),
                _ => match y {
                    0 => ok("LD", "I,A", 9),
                    1 => ok("LD", "R,A", 9),
                    2 => ok("LD", "A,I", 9),
                    3 => ok("LD", "A,R", 9),
                    4 => ok("RRD", "", 18),
                    5 => ok("RLD", "", 18),
                    _ => ok("NOP", "", 8),
                },
            },
            2 if z <= 3 && y >= 4 => ok(BLOCK[(y - 4) as usize][z as usize], "", 16),
            _ => None,
        }
    }
}

/// Zilog Z80 core
#[derive(Debug, Default, Clone, Copy)]
pub struct Z80Core;

impl Z80Core {
    pub fn new() -> Self {
        Self
    }
}

impl CpuCore for Z80Core {
    fn architecture(&self) -> Architecture {
        Architecture::Z80
    }

    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction {
        let address = address & 0xFFFF;
        let wrapped = |addr: u32| read(addr & 0xFFFF);
        let read: &dyn Fn(u32) -> u8 = &wrapped;
        let mut decoder = Decoder {
            read,
            pos: address,
            index: None,
        };
        match decoder.decode() {
            Some((mnemonic, operands, cycles)) => {
                let size = decoder.pos.wrapping_sub(address);
                Instruction::decoded(address, mnemonic, operands, size, cycles, read)
            }
            None => Instruction::decoded(address, "???", "", 1, 4, read),
        }
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "CALL" | "RST")
    }

    fn is_return_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "RET" | "RETI" | "RETN")
    }

    fn is_jump_instruction(&self, insn: &Instruction) -> bool {
        matches!(insn.mnemonic.as_str(), "JP" | "JR" | "DJNZ")
    }

    fn register_names(&self) -> &'static [&'static str] {
        &REGISTER_NAMES
    }

    fn min_instruction_size(&self) -> u32 {
        1
    }

    fn max_instruction_size(&self) -> u32 {
        4
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
        Z80Core::new().disassemble_instruction(address, &read)
    }

    #[test]
    fn test_fetches_wrap_at_top_of_memory() {
        let mut mem = vec![0u8; 0x10000];
        mem[0xFFFF] = 0xCD;
        mem[0x0000] = 0x34;
        mem[0x0001] = 0x12;
        let seen = std::cell::RefCell::new(Vec::new());
        let read = |addr: u32| {
            seen.borrow_mut().push(addr);
            mem[addr as usize]
        };

        let core = Z80Core::new();
        let call = core.disassemble_instruction(0xFFFF, &read);
        assert_eq!(call.text(), "CALL $1234");
        assert_eq!(call.size, 3);
        assert_eq!(call.bytes, vec![0xCD, 0x34, 0x12]);

        let range = core.disassemble_range(0xFFFF, 2, &read);
        assert_eq!(range[1].address, 0x0002);
        assert!(seen.borrow().iter().all(|&addr| addr <= 0xFFFF));
    }

    #[test]
    fn test_call_and_return() {
        let core = Z80Core::new();
        let call = decode_bytes(0x100, &[0xCD, 0x34, 0x12]);
        assert_eq!(call.text(), "CALL $1234");
        assert_eq!(call.size, 3);
        assert!(core.is_call_instruction(&call));
        assert_eq!(core.branch_target_address(&call), 0x1234);

        let call = decode_bytes(0x100, &[0xC4, 0x00, 0x40]);
        assert_eq!(call.text(), "CALL NZ,$4000");
        assert_eq!(core.branch_target_address(&call), 0x4000);

        let ret = decode_bytes(0, &[0xC9]);
        assert_eq!(ret.mnemonic, "RET");
        assert!(core.is_return_instruction(&ret));
        let ret = decode_bytes(0, &[0xC8]);
        assert_eq!(ret.text(), "RET Z");
        assert!(core.is_return_instruction(&ret));
        let reti = decode_bytes(0, &[0xED, 0x4D]);
        assert_eq!(reti.mnemonic, "RETI");
        assert_eq!(reti.size, 2);
    }

    #[test]
    fn test_relative_jumps_are_hex() {
        let core = Z80Core::new();
        let jr = decode_bytes(0x0200, &[0x18, 0xFE]);
        assert_eq!(jr.text(), "JR $0200");
        assert!(core.is_jump_instruction(&jr));
        assert_eq!(core.branch_target_address(&jr), 0x0200);

        let djnz = decode_bytes(0x0200, &[0x10, 0x05]);
        assert_eq!(djnz.text(), "DJNZ $0207");

        let jr = decode_bytes(0x0200, &[0x20, 0x10]);
        assert_eq!(jr.text(), "JR NZ,$0212");
    }

    #[test]
    fn test_indirect_jump_has_no_target() {
        let core = Z80Core::new();
        let jp = decode_bytes(0, &[0xE9]);
        assert_eq!(jp.text(), "JP (HL)");
        assert!(core.is_jump_instruction(&jp));
        assert_eq!(core.branch_target_address(&jp), 0);

        let jp = decode_bytes(0, &[0xDD, 0xE9]);
        assert_eq!(jp.text(), "JP (IX)");
        assert_eq!(jp.size, 2);
    }

    #[test]
    fn test_rst_is_a_call() {
        let core = Z80Core::new();
        let rst = decode_bytes(0, &[0xFF]);
        assert_eq!(rst.text(), "RST $38");
        assert!(core.is_call_instruction(&rst));
        assert_eq!(core.branch_target_address(&rst), 0x38);
    }

    #[test]
    fn test_loads() {
        assert_eq!(decode_bytes(0, &[0x3E, 0x42]).text(), "LD A,$42");
        assert_eq!(decode_bytes(0, &[0x21, 0x00, 0x80]).text(), "LD HL,$8000");
        assert_eq!(decode_bytes(0, &[0x78]).text(), "LD A,B");
        assert_eq!(decode_bytes(0, &[0x7E]).text(), "LD A,(HL)");
        assert_eq!(decode_bytes(0, &[0x32, 0x00, 0xC0]).text(), "LD ($C000),A");
        assert_eq!(decode_bytes(0, &[0x76]).text(), "HALT");
    }

    #[test]
    fn test_index_prefixes() {
        let insn = decode_bytes(0, &[0xDD, 0x7E, 0x05]);
        assert_eq!(insn.text(), "LD A,(IX+$05)");
        assert_eq!(insn.size, 3);

        let insn = decode_bytes(0, &[0xFD, 0x66, 0xFE]);
        assert_eq!(insn.text(), "LD H,(IY-$02)");

        let insn = decode_bytes(0, &[0xDD, 0x36, 0x01, 0x99]);
        assert_eq!(insn.text(), "LD (IX+$01),$99");
        assert_eq!(insn.size, 4);

        let insn = decode_bytes(0, &[0xDD, 0xCB, 0x02, 0x46]);
        assert_eq!(insn.text(), "BIT 0,(IX+$02)");
        assert_eq!(insn.size, 4);
    }

    #[test]
    fn test_cb_and_ed() {
        assert_eq!(decode_bytes(0, &[0xCB, 0x7F]).text(), "BIT 7,A");
        assert_eq!(decode_bytes(0, &[0xCB, 0x00]).text(), "RLC B");
        assert_eq!(decode_bytes(0, &[0xED, 0xB0]).text(), "LDIR");
        assert_eq!(decode_bytes(0, &[0xED, 0x56]).text(), "IM 1");
        assert_eq!(
            decode_bytes(0, &[0xED, 0x43, 0x00, 0x90]).text(),
            "LD ($9000),BC"
        );
    }

    #[test]
    fn test_alu() {
        assert_eq!(decode_bytes(0, &[0x80]).text(), "ADD A,B");
        assert_eq!(decode_bytes(0, &[0xFE, 0x10]).text(), "CP $10");
        assert_eq!(decode_bytes(0, &[0xAF]).text(), "XOR A");
    }

    #[test]
    fn test_invalid_ed_advances_one_byte() {
        let insn = decode_bytes(0, &[0xED, 0x00]);
        assert_eq!(insn.mnemonic, "???");
        assert_eq!(insn.size, 1);
    }
}
