use serde::Serialize;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Content checksum used to tell replicated snapshots apart.
///
/// The value is computed over the CBOR encoding of the payload, so two structurally equal
/// snapshots always produce the same checksum on both clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u64);

impl Checksum {
    /// Computes a 64-bit FNV-1a checksum over the given payload.
    ///
    /// # Arguments
    ///
    /// * `payload` - A byte slice containing the data to compute the checksum for.
    ///
    /// # Returns
    ///
    /// The FNV-1a hash of `payload` wrapped in a `Checksum`.
    pub fn new(payload: &[u8]) -> Self {
        let mut hash = FNV_OFFSET;
        for &byte in payload {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        Checksum(hash)
    }

    /// Encodes `value` as CBOR and checksums the bytes.
    pub fn of<T: Serialize>(value: &T) -> Result<Self, serde_cbor::Error> {
        let bytes = serde_cbor::to_vec(value)?;
        Ok(Checksum::new(&bytes))
    }

    /// Verifies that the provided checksum matches the computed checksum for the payload.
    ///
    /// # Arguments
    ///
    /// * `payload` - A byte slice containing the data to validate.
    ///
    /// # Returns
    ///
    /// `true` if `self` matches the checksum of `payload`; `false` otherwise.
    pub fn check(&self, payload: &[u8]) -> bool {
        *self == Checksum::new(payload)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty_payload() {
        // FNV-1a of nothing is the offset basis
        assert_eq!(Checksum::new(&[]), Checksum(FNV_OFFSET));
    }

    #[test]
    fn test_checksum_known_vector() {
        // FNV-1a 64 of "a"
        assert_eq!(Checksum::new(b"a"), Checksum(0xaf63_dc4c_8601_ec8c));
    }

    #[test]
    fn test_checksum_order_sensitive() {
        assert_ne!(Checksum::new(&[0x01, 0x02]), Checksum::new(&[0x02, 0x01]));
    }

    #[test]
    fn test_checksum_check_valid() {
        let payload: &[u8] = &[0x10, 0x20, 0x30];
        let checksum = Checksum::new(payload);
        assert!(checksum.check(payload));
    }

    #[test]
    fn test_checksum_check_invalid() {
        let payload: &[u8] = &[0x10, 0x20, 0x30];
        assert!(!Checksum(0xFF).check(payload));
    }

    #[test]
    fn test_checksum_of_structures() {
        #[derive(Serialize)]
        struct Sample {
            sequence: u64,
            label: &'static str,
        }

        let a = Checksum::of(&Sample { sequence: 3, label: "x" }).unwrap();
        let b = Checksum::of(&Sample { sequence: 3, label: "x" }).unwrap();
        let c = Checksum::of(&Sample { sequence: 4, label: "x" }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
