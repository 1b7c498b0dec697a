//! Operand text helpers shared by the decoders

/// Last comma-separated field of an operand string, trimmed
pub fn last_field(operands: &str) -> &str {
    operands.rsplit(',').next().unwrap_or("").trim()
}

/// Parse a `$HEX` or `0xHEX` literal
pub fn parse_hex_literal(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("0x"))
        .or_else(|| text.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Resolved target written as the last operand, if any
///
/// Register-indirect forms such as `(HL)` or `LR` yield `None`.
pub fn parse_branch_target(operands: &str) -> Option<u32> {
    parse_hex_literal(last_field(operands))
}

/// `$XX` with two uppercase digits
pub fn hex8(value: u8) -> String {
    format!("${:02X}", value)
}

/// `$XXXX` with four uppercase digits
pub fn hex16(value: u16) -> String {
    format!("${:04X}", value)
}

/// `$XXXXXXXX` with eight uppercase digits
pub fn hex32(value: u32) -> String {
    format!("${:08X}", value)
}

/// Signed displacement as `$X` or `-$X`
pub fn signed_hex(value: i32) -> String {
    if value < 0 {
        format!("-${:X}", value.unsigned_abs())
    } else {
        format!("${:X}", value)
    }
}

/// Apply a signed displacement to an address
pub fn offset(address: u32, displacement: i32) -> u32 {
    address.wrapping_add(displacement as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_target() {
        assert_eq!(parse_branch_target("$001010"), Some(0x1010));
        assert_eq!(parse_branch_target("D0,$00001234"), Some(0x1234));
        assert_eq!(parse_branch_target("NZ,$4000"), Some(0x4000));
        assert_eq!(parse_branch_target("$t0,$t1,0x80001000"), Some(0x8000_1000));
        assert_eq!(parse_branch_target("(HL)"), None);
        assert_eq!(parse_branch_target(""), None);
        assert_eq!(parse_branch_target("$"), None);
    }

    #[test]
    fn test_signed_hex() {
        assert_eq!(signed_hex(-8), "-$8");
        assert_eq!(signed_hex(0x10), "$10");
        assert_eq!(offset(0x1000, -2), 0x0FFE);
    }
}
