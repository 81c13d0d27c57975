use super::Encoder;
use crate::bit::Bit;

/// Manchester line code: every data bit becomes `[!b, b]`, so each bit cell
/// carries exactly one mid-cell transition whose end value is the data bit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManchesterEncoder;

impl ManchesterEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Alternating data bits starting at `One`.
    ///
    /// Encoded, this is the `0110 0110 ...` pattern whose transitions are all
    /// one bit cell apart, which a decoder uses to learn the sender's clock.
    #[must_use]
    pub fn preamble(bit_count: usize) -> Vec<Bit> {
        (0..bit_count)
            .map(|i| if i % 2 == 0 { Bit::One } else { Bit::Zero })
            .collect()
    }
}

impl Encoder for ManchesterEncoder {
    fn encode(&self, bits: &[Bit]) -> Vec<Bit> {
        let mut encoded = Vec::with_capacity(bits.len() * 2);
        for &bit in bits {
            encoded.push(bit.opposite());
            encoded.push(bit);
        }
        encoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bit::{format_bits, parse_bits};

    #[test]
    fn test_manchester_encodings() {
        let cases = [
            ("", ""),
            ("0", "10"),
            ("1", "01"),
            ("00", "1010"),
            ("01", "1001"),
            ("10", "0110"),
            ("11", "0101"),
        ];

        let encoder = ManchesterEncoder::new();
        for (data, expected) in cases {
            let encoded = encoder.encode(&parse_bits(data).unwrap());
            assert_eq!(format_bits(&encoded), expected, "encoding {:?}", data);
        }
    }

    #[test]
    fn test_encoding_layout() {
        let data = parse_bits("1100101").unwrap();
        let encoded = ManchesterEncoder::new().encode(&data);

        assert_eq!(encoded.len(), 2 * data.len());
        for (i, &bit) in data.iter().enumerate() {
            assert_eq!(encoded[2 * i], bit.opposite());
            assert_eq!(encoded[2 * i + 1], bit);
        }
    }

    #[test]
    fn test_preamble_pattern() {
        let preamble = ManchesterEncoder::preamble(4);
        assert_eq!(format_bits(&preamble), "1010");

        let encoded = ManchesterEncoder::new().encode(&preamble);
        assert_eq!(format_bits(&encoded), "01100110");
        assert!(ManchesterEncoder::preamble(0).is_empty());
    }
}
