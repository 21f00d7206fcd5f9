use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Monetary amount represented in minor units (cents) to avoid floating
/// point drift in arithmetic.
///
/// On the wire the amount is a plain JSON decimal (`"totalAmount": 99.99`),
/// so serialization converts between the decimal representation and cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates an amount from minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in minor units.
    pub fn as_cents(&self) -> i64 {
        self.cents
    }

    /// Returns true for amounts below zero.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.cents as f64 / 100.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(D::Error::custom("amount must be a finite number"));
        }
        Ok(Self {
            cents: (value * 100.0).round() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cents_roundtrip() {
        let m = Money::from_cents(9999);
        assert_eq!(m.as_cents(), 9999);
        assert!(!m.is_negative());
    }

    #[test]
    fn display_formats_as_decimal() {
        assert_eq!(Money::from_cents(9999).to_string(), "99.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-125).to_string(), "-1.25");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn deserializes_wire_decimals() {
        let m: Money = serde_json::from_str("99.99").unwrap();
        assert_eq!(m.as_cents(), 9999);

        let m: Money = serde_json::from_str("100").unwrap();
        assert_eq!(m.as_cents(), 10000);

        let m: Money = serde_json::from_str("0.01").unwrap();
        assert_eq!(m.as_cents(), 1);
    }

    #[test]
    fn serializes_to_wire_decimal() {
        let json = serde_json::to_string(&Money::from_cents(9999)).unwrap();
        assert_eq!(json, "99.99");
    }

    #[test]
    fn serde_roundtrip_preserves_cents() {
        for cents in [0, 1, 99, 100, 9999, 123_456_789] {
            let m = Money::from_cents(cents);
            let json = serde_json::to_string(&m).unwrap();
            let back: Money = serde_json::from_str(&json).unwrap();
            assert_eq!(back, m, "roundtrip failed for {cents} cents");
        }
    }

    #[test]
    fn rejects_non_finite_amounts() {
        assert!(serde_json::from_str::<Money>("\"NaN\"").is_err());
    }
}
