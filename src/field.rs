//! Field elements: integers modulo the proof system's prime
//!
//! Every value inside the VM is a [`FieldElement`]. Arithmetic wraps modulo
//! `P = 2^251 + 17 * 2^192 + 1`.

use num_bigint::{BigInt, BigUint, Sign};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

lazy_static::lazy_static! {
    /// The field prime `2^251 + 17 * 2^192 + 1`
    pub static ref PRIME: BigUint =
        (BigUint::from(1u32) << 251) + (BigUint::from(17u32) << 192) + BigUint::from(1u32);
}

/// An element of the prime field
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(BigUint);

impl FieldElement {
    /// The additive identity
    pub fn zero() -> Self {
        FieldElement(BigUint::default())
    }

    /// Reduce an arbitrary unsigned integer into the field
    pub fn from_biguint(value: BigUint) -> Self {
        FieldElement(value % &*PRIME)
    }

    /// Reduce a signed integer into the field (negative values wrap around)
    pub fn from_bigint(value: &BigInt) -> Self {
        let prime = BigInt::from_biguint(Sign::Plus, PRIME.clone());
        let reduced = ((value % &prime) + &prime) % &prime;
        // reduced is non-negative by construction
        FieldElement(reduced.to_biguint().unwrap_or_default())
    }

    /// Interpret big-endian bytes as an integer and reduce it into the field
    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self::from_biguint(BigUint::from_bytes_be(bytes))
    }

    /// Fixed-width 32-byte big-endian encoding
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let raw = self.0.to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - raw.len()..].copy_from_slice(&raw);
        out
    }

    /// `0x`-prefixed, zero-padded hex string
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_be_bytes()))
    }

    /// Parse a decimal or `0x`-prefixed hex string
    pub fn from_str_radix_auto(text: &str) -> Option<Self> {
        let value = match text.strip_prefix("0x") {
            Some(digits) => BigUint::parse_bytes(digits.as_bytes(), 16)?,
            None => BigUint::parse_bytes(text.as_bytes(), 10)?,
        };
        Some(Self::from_biguint(value))
    }

    /// Returns true for the additive identity
    pub fn is_zero(&self) -> bool {
        self.0 == BigUint::default()
    }

    /// Underlying integer representative in `[0, P)`
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// The value as `u64` if it fits
    pub fn to_u64(&self) -> Option<u64> {
        let digits = self.0.to_u64_digits();
        match digits.as_slice() {
            [] => Some(0),
            [single] => Some(*single),
            _ => None,
        }
    }
}

impl Default for FieldElement {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_biguint(BigUint::from(value))
    }
}

impl From<i128> for FieldElement {
    fn from(value: i128) -> Self {
        Self::from_bigint(&BigInt::from(value))
    }
}

impl From<usize> for FieldElement {
    fn from(value: usize) -> Self {
        Self::from_biguint(BigUint::from(value))
    }
}

impl Add for &FieldElement {
    type Output = FieldElement;

    fn add(self, rhs: &FieldElement) -> FieldElement {
        FieldElement::from_biguint(&self.0 + &rhs.0)
    }
}

impl Sub for &FieldElement {
    type Output = FieldElement;

    fn sub(self, rhs: &FieldElement) -> FieldElement {
        FieldElement::from_biguint(&self.0 + &*PRIME - &rhs.0)
    }
}

impl Mul for &FieldElement {
    type Output = FieldElement;

    fn mul(self, rhs: &FieldElement) -> FieldElement {
        FieldElement::from_biguint(&self.0 * &rhs.0)
    }
}

impl Neg for &FieldElement {
    type Output = FieldElement;

    fn neg(self) -> FieldElement {
        &FieldElement::zero() - self
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Serialized as a decimal string: felts do not fit JSON numbers.
impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        FieldElement::from_str_radix_auto(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid field element: {}", text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_value() {
        assert_eq!(
            PRIME.to_string(),
            "3618502788666131213697322783095070105623107215331596699973092056135872020481"
        );
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let one = FieldElement::from(1u64);
        let minus_one = FieldElement::from(-1i128);
        assert!((&one + &minus_one).is_zero());
        assert_eq!(&FieldElement::zero() - &one, minus_one);
        assert_eq!(-&one, minus_one);
        assert_eq!(
            &FieldElement::from(6u64) * &FieldElement::from(7u64),
            FieldElement::from(42u64)
        );
    }

    #[test]
    fn test_bytes_and_hex() {
        let value = FieldElement::from(255u64);
        let bytes = value.to_be_bytes();
        assert_eq!(bytes[31], 0xff);
        assert!(bytes[..31].iter().all(|b| *b == 0));
        assert!(value.to_hex().ends_with("ff"));
        assert_eq!(FieldElement::from_str_radix_auto("0xff"), Some(value));
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let value = FieldElement::from(150u64);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"150\"");
        let back: FieldElement = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
