//! Witness scope flags controlling which contracts a signature authorizes.

use std::fmt;

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WitnessScope: u8 {
        /// Only the transaction itself is signed; no contract is witnessed.
        const NONE = 0x00;
        /// The witness is valid only when the entry-point script matches.
        const CALLED_BY_ENTRY = 0x01;
        /// Valid for an explicit allow-list of contract hashes.
        const CUSTOM_CONTRACTS = 0x10;
        /// Valid for contracts in an explicit allow-list of public key groups.
        const CUSTOM_GROUPS = 0x20;
        /// Valid when the attached `WitnessRule`s evaluate to allow.
        const WITNESS_RULES = 0x40;
        /// Valid in every context. Cannot be combined with any other flag.
        const GLOBAL = 0x80;
    }
}

impl WitnessScope {
    /// Every bit outside this mask is rejected during deserialization.
    const VALID_BITS: u8 = Self::CALLED_BY_ENTRY.bits()
        | Self::CUSTOM_CONTRACTS.bits()
        | Self::CUSTOM_GROUPS.bits()
        | Self::WITNESS_RULES.bits()
        | Self::GLOBAL.bits();

    pub fn from_byte(value: u8) -> Option<Self> {
        if value & !Self::VALID_BITS != 0 {
            return None;
        }
        let scope = Self::from_bits_truncate(value);
        if scope.contains(Self::GLOBAL) && scope != Self::GLOBAL {
            return None;
        }
        Some(scope)
    }

    pub fn to_byte(self) -> u8 {
        self.bits()
    }
}

impl Default for WitnessScope {
    fn default() -> Self {
        Self::NONE
    }
}

impl fmt::Display for WitnessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl serde::Serialize for WitnessScope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.to_byte())
    }
}

impl<'de> serde::Deserialize<'de> for WitnessScope {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let byte = u8::deserialize(deserializer)?;
        WitnessScope::from_byte(byte)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid witness scope byte 0x{byte:02x}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_global_combined_with_other_flags() {
        assert!(WitnessScope::from_byte(0x81).is_none());
    }

    #[test]
    fn accepts_valid_combination() {
        let scope = WitnessScope::from_byte(0x11).unwrap();
        assert!(scope.contains(WitnessScope::CALLED_BY_ENTRY));
        assert!(scope.contains(WitnessScope::CUSTOM_CONTRACTS));
    }

    #[test]
    fn rejects_unknown_bits() {
        assert!(WitnessScope::from_byte(0x08).is_none());
    }

    #[test]
    fn round_trips_through_byte() {
        let scope = WitnessScope::CALLED_BY_ENTRY | WitnessScope::WITNESS_RULES;
        assert_eq!(WitnessScope::from_byte(scope.to_byte()), Some(scope));
    }
}
