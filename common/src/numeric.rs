/// A type that represents the radix of a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Hexadecimal,
    Decimal,
}

impl Radix {
    pub fn as_num(self) -> u32 {
        match self {
            Self::Hexadecimal => 16,
            Self::Decimal => 10,
        }
    }
}

/// A helper type to interpret a numeric literal represented by a string.
#[derive(Debug, Clone)]
pub struct Literal<'a> {
    /// The number part of the string.
    num: &'a str,
    /// The radix of the literal.
    radix: Radix,
}

impl<'a> Literal<'a> {
    pub fn new(src: &'a str) -> Self {
        debug_assert!(!src.is_empty());
        let (radix, rest) = if src.len() >= 2 && matches!(&src[0..2], "0x" | "0X") {
            (Radix::Hexadecimal, &src[2..])
        } else {
            (Radix::Decimal, src)
        };

        Self { num: rest, radix }
    }

    pub fn radix(&self) -> Radix {
        self.radix
    }

    /// Parse the literal into a 32-byte big-endian VM word.
    ///
    /// Returns `None` if the literal contains an invalid digit or does not
    /// fit in 256 bits.
    pub fn parse_word(&self) -> Option<[u8; 32]> {
        let mut word = [0u8; 32];
        for ch in self.num.chars() {
            if ch == '_' {
                continue;
            }
            let digit = ch.to_digit(self.radix.as_num())? as u8;
            mul_add(&mut word, self.radix.as_num() as u8, digit)?;
        }
        Some(word)
    }
}

/// `word = word * factor + addend`, big-endian, failing on overflow.
fn mul_add(word: &mut [u8; 32], factor: u8, addend: u8) -> Option<()> {
    let mut carry = addend as u32;
    for byte in word.iter_mut().rev() {
        let value = *byte as u32 * factor as u32 + carry;
        *byte = (value & 0xff) as u8;
        carry = value >> 8;
    }
    if carry == 0 {
        Some(())
    } else {
        None
    }
}

/// Render a 32-byte word as a minimal `0x`-prefixed hex literal.
pub fn to_hex_literal(word: &[u8; 32]) -> String {
    let first = word.iter().position(|byte| *byte != 0);
    match first {
        None => "0x0".to_string(),
        Some(idx) => {
            let hex = hex::encode(&word[idx..]);
            format!("0x{}", hex.trim_start_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{to_hex_literal, Literal, Radix};

    #[test]
    fn radix_detection() {
        assert_eq!(Literal::new("0xFF").radix(), Radix::Hexadecimal);
        assert_eq!(Literal::new("0XFF").radix(), Radix::Hexadecimal);
        assert_eq!(Literal::new("1").radix(), Radix::Decimal);
    }

    #[test]
    fn parse_decimal() {
        let word = Literal::new("256").parse_word().unwrap();
        assert_eq!(word[30], 1);
        assert_eq!(word[31], 0);
    }

    #[test]
    fn parse_hex_address() {
        let word = Literal::new("0xc6d9d2cd449a754c494264e1809c50e34d64562b")
            .parse_word()
            .unwrap();
        assert_eq!(word[12], 0xc6);
        assert_eq!(word[31], 0x2b);
    }

    #[test]
    fn overflow_rejected() {
        let src = format!("0x1{}", "0".repeat(64));
        assert!(Literal::new(&src).parse_word().is_none());
    }

    #[test]
    fn hex_rendering() {
        let word = Literal::new("255").parse_word().unwrap();
        assert_eq!(to_hex_literal(&word), "0xff");
        assert_eq!(to_hex_literal(&[0; 32]), "0x0");
    }
}
