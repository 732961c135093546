use std::fmt;
use std::str::FromStr;

use crate::error::DecodeError;

/// Manufacturer specific data from an advertisement: a 2-byte company
/// identifier followed by an opaque vendor payload.
///
/// The empty value (`ManufacturerData::default()`) stands for an
/// advertisement without manufacturer data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ManufacturerData {
    manufacturer_id: Option<[u8; 2]>,
    payload: Vec<u8>,
}

impl ManufacturerData {
    pub fn new(manufacturer_id: [u8; 2], payload: Vec<u8>) -> Self {
        Self {
            manufacturer_id: Some(manufacturer_id),
            payload,
        }
    }

    /// Builds the value from a 16-bit company identifier, stored little-endian.
    pub fn from_company_id(company_id: u16, payload: Vec<u8>) -> Self {
        Self::new(company_id.to_le_bytes(), payload)
    }

    /// Parses the hex form delivered by the platform layer: identifier bytes
    /// first, then the payload, two hex digits per byte.
    ///
    /// An empty string yields the empty value. Any other input must hold at
    /// least the 2 identifier bytes.
    pub fn decode(hex: &str) -> Result<Self, DecodeError> {
        if hex.is_empty() {
            return Ok(Self::default());
        }

        if hex.len() % 2 != 0 {
            return Err(DecodeError::OddLength(hex.len()));
        }

        let mut bytes = Vec::with_capacity(hex.len() / 2);
        let mut high = None;

        for (index, character) in hex.char_indices() {
            let nibble = character
                .to_digit(16)
                .ok_or(DecodeError::InvalidHexCharacter { character, index })?
                as u8;

            match high.take() {
                Some(high) => bytes.push(high << 4 | nibble),
                None => high = Some(nibble),
            }
        }

        if bytes.len() < 2 {
            return Err(DecodeError::TooShort { len: bytes.len() });
        }

        let payload = bytes.split_off(2);
        Ok(Self::new([bytes[0], bytes[1]], payload))
    }

    /// Maps every identifier and payload byte to the character with the same
    /// code point. This is a display helper and not the inverse of
    /// [`decode`](Self::decode): bytes above 0x7F come out as Latin-1 characters.
    pub fn encode(&self) -> String {
        self.manufacturer_id()
            .iter()
            .chain(self.payload.iter())
            .map(|&byte| char::from(byte))
            .collect()
    }

    /// Renders `<XXYY> AABB CCDD ...` for humans. Not parseable.
    pub fn to_formatted_string(&self) -> String {
        let mut out = String::from("<");
        for byte in self.manufacturer_id() {
            out.push_str(&format!("{:02X}", byte));
        }
        out.push('>');

        for pair in self.payload.chunks(2) {
            out.push(' ');
            for byte in pair {
                out.push_str(&format!("{:02X}", byte));
            }
        }

        out
    }

    /// Identifier bytes as received: empty or exactly 2 bytes.
    pub fn manufacturer_id(&self) -> &[u8] {
        match &self.manufacturer_id {
            Some(id) => &id[..],
            None => &[],
        }
    }

    /// Identifier interpreted as a little-endian company id.
    pub fn company_id(&self) -> Option<u16> {
        self.manufacturer_id.map(u16::from_le_bytes)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.manufacturer_id.is_none() && self.payload.is_empty()
    }
}

impl FromStr for ManufacturerData {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl fmt::Display for ManufacturerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_formatted_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_empty_is_absent_data() {
        let data = ManufacturerData::decode("").unwrap();

        assert!(data.is_empty());
        assert!(data.manufacturer_id().is_empty());
        assert!(data.payload().is_empty());
        assert_eq!(data.company_id(), None);
    }

    #[test]
    fn decode_splits_identifier_and_payload() {
        let data = ManufacturerData::decode("4c000215aabb").unwrap();

        assert_eq!(data.manufacturer_id(), &[0x4C, 0x00]);
        assert_eq!(data.payload(), &[0x02, 0x15, 0xAA, 0xBB]);
        assert_eq!(data.company_id(), Some(0x004C));
    }

    #[test]
    fn decode_identifier_only() {
        let data = ManufacturerData::decode("3412").unwrap();

        assert_eq!(data.company_id(), Some(0x1234));
        assert!(data.payload().is_empty());
        assert!(!data.is_empty());
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(
            ManufacturerData::decode("FF"),
            Err(DecodeError::TooShort { len: 1 })
        );
        assert_eq!(ManufacturerData::decode("F"), Err(DecodeError::OddLength(1)));
        assert_eq!(ManufacturerData::decode("FFF"), Err(DecodeError::OddLength(3)));
    }

    #[test]
    fn decode_rejects_non_hex() {
        assert_eq!(
            ManufacturerData::decode("FFzz00"),
            Err(DecodeError::InvalidHexCharacter {
                character: 'z',
                index: 2
            })
        );
    }

    #[test]
    fn from_str_decodes() {
        let data: ManufacturerData = "FFFF00".parse().unwrap();
        assert_eq!(data.payload(), &[0x00]);
    }

    #[test]
    fn formatted_string_groups_payload_pairs() {
        let data = ManufacturerData::decode("FFFF00010203").unwrap();

        assert_eq!(data.to_formatted_string(), "<FFFF> 0001 0203");
        assert_eq!(data.to_string(), "<FFFF> 0001 0203");
    }

    #[test]
    fn formatted_string_odd_payload_and_lowercase_input() {
        let data = ManufacturerData::decode("abcd0a0b0c").unwrap();
        assert_eq!(data.to_formatted_string(), "<ABCD> 0A0B 0C");

        let data = ManufacturerData::new([0x01, 0x02], Vec::new());
        assert_eq!(data.to_formatted_string(), "<0102>");
    }

    #[test]
    fn encode_maps_bytes_to_chars() {
        let data = ManufacturerData::new([0x41, 0x42], vec![0x43, 0xE9]);
        assert_eq!(data.encode(), "ABC\u{e9}");

        assert_eq!(ManufacturerData::default().encode(), "");
    }

    #[test]
    fn company_id_is_little_endian() {
        let data = ManufacturerData::from_company_id(0x1234, vec![0xAA]);
        assert_eq!(data.manufacturer_id(), &[0x34, 0x12]);
        assert_eq!(data.company_id(), Some(0x1234));
    }
}
