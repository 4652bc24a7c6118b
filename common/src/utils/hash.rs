use tiny_keccak::{Hasher, Keccak};

/// Return the keccak-256 hash of the given content as an array of bytes.
pub fn keccak256(content: &[u8]) -> [u8; 32] {
    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];

    keccak.update(content);
    keccak.finalize(&mut output);

    output
}

/// The first four bytes of the keccak-256 hash of a canonical function
/// signature, e.g. `register(bytes32)`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Hex-encode a hash with a `0x` prefix.
pub fn hex_prefixed(content: &[u8]) -> String {
    format!("0x{}", hex::encode(content))
}

#[cfg(test)]
mod tests {
    use super::{function_selector, hex_prefixed, keccak256};

    #[test]
    fn empty_hash() {
        // keccak-256 of the empty string is a fixed constant
        assert_eq!(
            hex_prefixed(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn transfer_selector() {
        assert_eq!(
            hex::encode(function_selector("transfer(address,uint256)")),
            "a9059cbb"
        );
    }
}
