//! CPU cores for retrodbg
//!
//! Each supported architecture implements [`CpuCore`], which decodes one
//! instruction at a time from a byte reader and answers the control-flow
//! questions the debugger needs (call, return, jump, branch target).

pub mod cpu_core;
pub mod flags;
pub mod operand;

pub mod arm;
pub mod m6502;
pub mod m68k;
pub mod mips;
pub mod z80;

pub use arm::ArmCore;
pub use cpu_core::{core_for, create_for_architecture, CpuCore, Instruction};
pub use flags::describe_flags;
pub use m6502::M6502Core;
pub use m68k::M68kCore;
pub use mips::MipsCore;
pub use z80::Z80Core;
