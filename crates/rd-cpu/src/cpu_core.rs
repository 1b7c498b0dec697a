//! The per-architecture capability trait and the decoded instruction record

use std::fmt;

use rd_core::Architecture;

use crate::operand;

/// One decoded instruction
///
/// `has_breakpoint` and `is_program_counter` are left `false` by the cores
/// and filled in by the disassembly view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instruction {
    /// Address of the first byte
    pub address: u32,
    /// Mnemonic, uppercase
    pub mnemonic: String,
    /// Operand text, empty when the instruction takes none
    pub operands: String,
    /// Encoded length in bytes, never zero
    pub size: u32,
    /// Nominal cycle count
    pub cycles: u32,
    /// Raw encoding
    pub bytes: Vec<u8>,
    pub has_breakpoint: bool,
    pub is_program_counter: bool,
    pub comment: String,
}

impl Instruction {
    /// Build an instruction and capture its raw bytes from `read`
    pub fn decoded(
        address: u32,
        mnemonic: impl Into<String>,
        operands: impl Into<String>,
        size: u32,
        cycles: u32,
        read: &dyn Fn(u32) -> u8,
    ) -> Self {
        let size = size.max(1);
        Self {
            address,
            mnemonic: mnemonic.into(),
            operands: operands.into(),
            size,
            cycles,
            bytes: (0..size).map(|i| read(address.wrapping_add(i))).collect(),
            ..Default::default()
        }
    }

    /// Address of the following instruction in memory
    pub fn next_address(&self) -> u32 {
        self.address.wrapping_add(self.size.max(1))
    }

    /// Mnemonic and operands as a single line
    pub fn text(&self) -> String {
        if self.operands.is_empty() {
            self.mnemonic.clone()
        } else {
            format!("{} {}", self.mnemonic, self.operands)
        }
    }

    /// Raw bytes as space-separated hex pairs
    pub fn bytes_hex(&self) -> String {
        self.bytes
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Per-architecture decoding and control-flow classification
///
/// Implementations are stateless: the same bytes at the same address always
/// decode to the same instruction.
pub trait CpuCore: Send + Sync {
    /// Architecture this core decodes
    fn architecture(&self) -> Architecture;

    /// Decode exactly one instruction at `address`
    ///
    /// Undecodable bytes produce a placeholder with the minimum size so that
    /// linear disassembly always makes progress.
    fn disassemble_instruction(&self, address: u32, read: &dyn Fn(u32) -> u8) -> Instruction;

    /// Decode `count` consecutive instructions starting at `address`
    fn disassemble_range(
        &self,
        address: u32,
        count: usize,
        read: &dyn Fn(u32) -> u8,
    ) -> Vec<Instruction> {
        let mut out = Vec::with_capacity(count);
        let mut current = address;
        for _ in 0..count {
            let insn = self.disassemble_instruction(current, read);
            current = insn.next_address();
            out.push(insn);
        }
        out
    }

    /// Size in bytes of the instruction at `address`
    fn instruction_size(&self, address: u32, read: &dyn Fn(u32) -> u8) -> u32 {
        self.disassemble_instruction(address, read).size
    }

    fn is_call_instruction(&self, insn: &Instruction) -> bool;

    fn is_return_instruction(&self, insn: &Instruction) -> bool;

    fn is_jump_instruction(&self, insn: &Instruction) -> bool;

    /// Statically known destination of a branch, call or jump; 0 if unknown
    fn branch_target_address(&self, insn: &Instruction) -> u32 {
        operand::parse_branch_target(&insn.operands).unwrap_or(0)
    }

    /// Register names in the order the host supplies values
    fn register_names(&self) -> &'static [&'static str];

    /// `$` followed by the architecture's fixed number of hex digits
    fn format_address(&self, address: u32) -> String {
        let arch = self.architecture();
        format!(
            "${:0width$X}",
            address & arch.address_mask(),
            width = arch.address_digits()
        )
    }

    fn min_instruction_size(&self) -> u32;

    fn max_instruction_size(&self) -> u32;
}

/// Create a core from an architecture tag such as `"M68K"` or `"Z80"`
pub fn create_for_architecture(tag: &str) -> Option<Box<dyn CpuCore>> {
    match tag.parse::<Architecture>() {
        Ok(arch) => Some(core_for(arch)),
        Err(e) => {
            tracing::warn!("No CPU core for tag {:?}: {}", tag, e);
            None
        }
    }
}

/// Create the core for a known architecture
pub fn core_for(arch: Architecture) -> Box<dyn CpuCore> {
    match arch {
        Architecture::M68K => Box::new(crate::m68k::M68kCore::new()),
        Architecture::Z80 => Box::new(crate::z80::Z80Core::new()),
        Architecture::ARM => Box::new(crate::arm::ArmCore::new()),
        Architecture::MIPS => Box::new(crate::mips::MipsCore::new()),
        Architecture::M6502 => Box::new(crate::m6502::M6502Core::new()),
    }
}
