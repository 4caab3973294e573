//! Memory-word read command and reply parsing
//!
//! ```text
//! > ocd_mdw 0x20000000
//! < 0x20000000: 0000aa55
//! ```

use crate::traits::{OcdError, Result};

/// Format the single-word read command for `address`
pub fn read_word_command(address: u32) -> String {
    format!("ocd_mdw 0x{:X}", address)
}

/// Parse a `<address>: <hex-value>` reply
///
/// When the echoed address parses, it must match `address`; a mismatch
/// means the reply belongs to some other command.
///
/// # Errors
/// - [`OcdError::MalformedReply`] when the reply has no `:` separator, no
///   value, or echoes a different address
/// - [`OcdError::InvalidValue`] when the value is not a 32-bit hex number
pub fn parse_word_reply(reply: &str, address: u32) -> Result<u32> {
    let (echoed, rest) = reply
        .split_once(':')
        .ok_or_else(|| OcdError::MalformedReply(reply.to_string()))?;

    if let Ok(echoed) = parse_hex(echoed.trim()) {
        if echoed != address {
            return Err(OcdError::MalformedReply(reply.to_string()));
        }
    }

    let value = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| OcdError::MalformedReply(reply.to_string()))?;

    parse_hex(value).map_err(|source| OcdError::InvalidValue {
        value: value.to_string(),
        source,
    })
}

fn parse_hex(text: &str) -> std::result::Result<u32, std::num::ParseIntError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_uses_uppercase_hex() {
        assert_eq!(read_word_command(0x2000_0000), "ocd_mdw 0x20000000");
        assert_eq!(read_word_command(0xe000_ed00), "ocd_mdw 0xE000ED00");
        assert_eq!(read_word_command(0), "ocd_mdw 0x0");
    }

    #[test]
    fn test_parse_reference_reply() {
        let value = parse_word_reply("0x20000000: 0000aa55", 0x2000_0000).unwrap();
        assert_eq!(value, 0x0000_AA55);
    }

    #[test]
    fn test_parse_tolerates_spacing_and_prefix() {
        assert_eq!(parse_word_reply("0xe000ed00:   410fc241 ", 0xE000_ED00).unwrap(), 0x410F_C241);
        assert_eq!(parse_word_reply("e000ed00: 0x410FC241", 0xE000_ED00).unwrap(), 0x410F_C241);
        assert_eq!(parse_word_reply("0x0: ffffffff", 0).unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_missing_separator() {
        let err = parse_word_reply("invalid command name \"ocd_mdw\"", 0).unwrap_err();
        assert!(matches!(err, OcdError::MalformedReply(_)));
    }

    #[test]
    fn test_parse_missing_value() {
        let err = parse_word_reply("0x20000000:", 0x2000_0000).unwrap_err();
        assert!(matches!(err, OcdError::MalformedReply(_)));
    }

    #[test]
    fn test_parse_non_hex_value() {
        let err = parse_word_reply("0x20000000: zzzz", 0x2000_0000).unwrap_err();
        match err {
            OcdError::InvalidValue { value, .. } => assert_eq!(value, "zzzz"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_value_wider_than_32_bits() {
        let err = parse_word_reply("0x20000000: 1ffffffff", 0x2000_0000).unwrap_err();
        assert!(matches!(err, OcdError::InvalidValue { .. }));
    }

    #[test]
    fn test_parse_rejects_other_address() {
        let err = parse_word_reply("0x20000004: 00000001", 0x2000_0000).unwrap_err();
        assert!(matches!(err, OcdError::MalformedReply(_)));
    }
}
