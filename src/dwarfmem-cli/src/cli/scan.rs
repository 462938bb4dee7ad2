//! Shared scan arguments and value parsers

use clap::Args;
use dwarfmem::VirtAddr;

/// Parse a hex (`0x...`) or decimal address
pub fn parse_address(address: &str) -> Result<VirtAddr, String> {
    let parsed = match address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
    {
        Some(hex) => VirtAddr::from_str_radix(hex, 16),
        None => address.parse::<VirtAddr>(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", address, e))
}

/// Parse a comparison operator for vector scans
pub fn parse_op(op: &str) -> Result<char, String> {
    match op {
        "=" | "<" | ">" => Ok(op.chars().next().unwrap_or('=')),
        _ => Err(format!("invalid operator '{}' (expected =, < or >)", op)),
    }
}

/// Address window for a scan
#[derive(Args, Debug, Clone, Copy)]
pub struct ScanRange {
    /// Lowest address to scan
    #[arg(long, value_parser = parse_address, default_value = "0")]
    pub start: VirtAddr,

    /// Highest address to scan
    #[arg(long, value_parser = parse_address, default_value = "0xffffffffffffffff")]
    pub end: VirtAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_hex() {
        assert_eq!(parse_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_address("0X1000").unwrap(), 0x1000);
        assert_eq!(parse_address("0xDEADBEEF").unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_parse_address_decimal() {
        assert_eq!(parse_address("4096").unwrap(), 4096);
        assert_eq!(parse_address("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_address_invalid() {
        assert!(parse_address("0xGGGG").is_err());
        assert!(parse_address("not_a_number").is_err());
    }

    #[test]
    fn test_parse_op() {
        assert_eq!(parse_op("<").unwrap(), '<');
        assert_eq!(parse_op("=").unwrap(), '=');
        assert!(parse_op("!=").is_err());
    }
}
