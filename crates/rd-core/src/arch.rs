//! CPU architecture tags and host memory callbacks

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DebugError;

/// Byte-level memory read supplied by the emulation host
pub type MemoryReadFn = Arc<dyn Fn(u32) -> u8 + Send + Sync>;

/// Byte-level memory write supplied by the emulation host
pub type MemoryWriteFn = Arc<dyn Fn(u32, u8) + Send + Sync>;

/// CPU architectures the debugger knows how to host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Architecture {
    /// Motorola 68000 family
    M68K,
    /// Zilog Z80
    Z80,
    /// ARM (32-bit ARM state)
    ARM,
    /// MIPS R3000 class
    MIPS,
    /// MOS 6502
    M6502,
}

/// Byte order of multi-byte values in emulated memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

impl Architecture {
    /// Every supported architecture, in tag order
    pub const ALL: [Architecture; 5] = [
        Architecture::M68K,
        Architecture::Z80,
        Architecture::ARM,
        Architecture::MIPS,
        Architecture::M6502,
    ];

    /// Tag used in persisted records and host APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M68K => "M68K",
            Self::Z80 => "Z80",
            Self::ARM => "ARM",
            Self::MIPS => "MIPS",
            Self::M6502 => "M6502",
        }
    }

    /// Byte order used when composing words from the byte reader
    pub fn endianness(&self) -> Endianness {
        match self {
            Self::M68K | Self::ARM | Self::MIPS => Endianness::Big,
            Self::Z80 | Self::M6502 => Endianness::Little,
        }
    }

    /// Hex digits shown for an address on this architecture
    pub fn address_digits(&self) -> usize {
        match self {
            Self::M68K | Self::ARM | Self::MIPS => 8,
            Self::Z80 | Self::M6502 => 4,
        }
    }

    /// Mask applied to addresses before display
    pub fn address_mask(&self) -> u32 {
        match self.address_digits() {
            4 => 0xFFFF,
            _ => 0xFFFF_FFFF,
        }
    }

    /// `address + offset`, wrapped within the address space
    pub fn offset_address(&self, address: u32, offset: u32) -> u32 {
        address.wrapping_add(offset) & self.address_mask()
    }

    /// Compose `size` bytes at `address` in this architecture's byte order
    ///
    /// Every byte address is wrapped within the address space, so a 16-bit
    /// part reading at `$FFFF` continues at `$0000`.
    pub fn read_value(&self, read: &dyn Fn(u32) -> u8, address: u32, size: u32) -> u64 {
        let mask = self.address_mask();
        self.endianness()
            .read_value(&|addr: u32| read(addr & mask), address & mask, size)
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = DebugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "M68K" | "68K" | "68000" => Ok(Self::M68K),
            "Z80" => Ok(Self::Z80),
            "ARM" => Ok(Self::ARM),
            "MIPS" => Ok(Self::MIPS),
            "M6502" | "6502" => Ok(Self::M6502),
            other => Err(DebugError::UnsupportedArchitecture(other.to_string())),
        }
    }
}

impl Endianness {
    /// Compose `size` bytes starting at `address` into a value
    pub fn read_value(&self, read: &dyn Fn(u32) -> u8, address: u32, size: u32) -> u64 {
        let mut value = 0u64;
        for i in 0..size {
            let byte = read(address.wrapping_add(i)) as u64;
            value = match self {
                Self::Big => (value << 8) | byte,
                Self::Little => value | (byte << (8 * i)),
            };
        }
        value
    }

    /// Split the low `size` bytes of `value` in this byte order
    pub fn to_bytes(&self, value: u64, size: u32) -> Vec<u8> {
        let mut bytes: Vec<u8> = (0..size).map(|i| (value >> (8 * i)) as u8).collect();
        if *self == Self::Big {
            bytes.reverse();
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_tags() {
        for arch in Architecture::ALL {
            assert_eq!(arch.as_str().parse::<Architecture>().unwrap(), arch);
        }
        assert_eq!("z80".parse::<Architecture>().unwrap(), Architecture::Z80);
        assert!("SH2".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_read_value_byte_order() {
        let mem = [0x12u8, 0x34, 0x56, 0x78];
        let read = |addr: u32| mem[addr as usize];
        assert_eq!(Endianness::Big.read_value(&read, 0, 4), 0x12345678);
        assert_eq!(Endianness::Little.read_value(&read, 0, 2), 0x3412);
    }

    #[test]
    fn test_read_value_wraps_16_bit_space() {
        let mut mem = vec![0u8; 0x10000];
        mem[0xFFFF] = 0x34;
        mem[0x0000] = 0x12;
        let read = |addr: u32| mem[addr as usize];
        assert_eq!(Architecture::Z80.read_value(&read, 0xFFFF, 2), 0x1234);
        assert_eq!(Architecture::M6502.offset_address(0xFFFF, 2), 0x0001);
        assert_eq!(Architecture::M68K.offset_address(0xFFFF, 2), 0x1_0001);
    }

    #[test]
    fn test_to_bytes() {
        assert_eq!(Endianness::Big.to_bytes(0x1234, 2), vec![0x12, 0x34]);
        assert_eq!(Endianness::Little.to_bytes(0x1234, 2), vec![0x34, 0x12]);
    }
}
