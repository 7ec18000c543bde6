//! Conversion between typed sensor values and 16-bit Modbus registers.
//!
//! Floats travel as IEEE-754 single precision, big-endian, most significant
//! word first. The producer and the gateway must agree on this bit-exactly.
//!
//! # Register layout
//!
//! ```text
//! offset  field        encoding
//! 0-1     temperature  f32 (high word, low word)
//! 2-3     humidity     f32
//! 4-5     pressure     f32
//! 6-7     vibration    f32
//! 8       production   u16
//! ```

use std::fmt;

use thiserror::Error;

/// First holding register of the sensor image.
pub const START_ADDRESS: u16 = 0;

/// Number of registers in the sensor image.
pub const REGISTER_COUNT: u16 = 9;

pub const TEMPERATURE_OFFSET: usize = 0;
pub const HUMIDITY_OFFSET: usize = 2;
pub const PRESSURE_OFFSET: usize = 4;
pub const VIBRATION_OFFSET: usize = 6;
pub const PRODUCTION_OFFSET: usize = 8;

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The register slice is too short for the requested value.
    #[error("register index {index} needs {needed} register(s), only {available} available")]
    Range {
        index: usize,
        needed: usize,
        available: usize,
    },
}

/// Encode a value as a big-endian f32 split into two registers.
///
/// The value is narrowed to `f32` first; anything beyond single precision
/// is lost here and nowhere else.
pub fn encode_float(value: f64) -> [u16; 2] {
    let bits = (value as f32).to_bits();
    [(bits >> 16) as u16, (bits & 0xFFFF) as u16]
}

/// Decode the big-endian f32 stored at `index` and `index + 1`.
pub fn decode_float(registers: &[u16], index: usize) -> Result<f64, CodecError> {
    let low_index = index.checked_add(1);
    match (registers.get(index), low_index.and_then(|i| registers.get(i))) {
        (Some(&high), Some(&low)) => {
            let bits = (u32::from(high) << 16) | u32::from(low);
            Ok(f64::from(f32::from_bits(bits)))
        }
        _ => Err(CodecError::Range {
            index,
            needed: 2,
            available: registers.len(),
        }),
    }
}

/// Like [`decode_float`], but yields `0.0` when the registers are missing.
pub fn decode_float_or_default(registers: &[u16], index: usize) -> f64 {
    decode_float(registers, index).unwrap_or(0.0)
}

/// Read the raw register at `index`, or `0` when it is missing.
pub fn decode_u16(registers: &[u16], index: usize) -> u16 {
    registers.get(index).copied().unwrap_or(0)
}

/// The five fields carried by the register image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorField {
    Temperature,
    Humidity,
    Pressure,
    Vibration,
    Production,
}

impl SensorField {
    /// All fields in register order.
    pub const ALL: [SensorField; 5] = [
        SensorField::Temperature,
        SensorField::Humidity,
        SensorField::Pressure,
        SensorField::Vibration,
        SensorField::Production,
    ];

    /// Register offset of the field within the image.
    pub fn offset(&self) -> usize {
        match self {
            SensorField::Temperature => TEMPERATURE_OFFSET,
            SensorField::Humidity => HUMIDITY_OFFSET,
            SensorField::Pressure => PRESSURE_OFFSET,
            SensorField::Vibration => VIBRATION_OFFSET,
            SensorField::Production => PRODUCTION_OFFSET,
        }
    }

    /// Number of registers the field occupies.
    pub fn width(&self) -> usize {
        match self {
            SensorField::Production => 1,
            _ => 2,
        }
    }

    /// Browse name of the node exposing the field.
    pub fn browse_name(&self) -> &'static str {
        match self {
            SensorField::Temperature => "Temperature",
            SensorField::Humidity => "Humidity",
            SensorField::Pressure => "Pressure",
            SensorField::Vibration => "Vibration",
            SensorField::Production => "Production",
        }
    }

    pub fn from_browse_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.browse_name() == name)
    }
}

impl fmt::Display for SensorField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.browse_name())
    }
}

/// One set of sensor values as carried by the register image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f64,
    /// Relative humidity, percent.
    pub humidity: f64,
    /// hPa.
    pub pressure: f64,
    pub vibration: f64,
    /// Units per hour.
    pub production: u16,
}

/// Result of decoding a (possibly short) register image.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedReading {
    pub reading: SensorReading,
    /// Fields that were missing from the image and defaulted to zero.
    pub defaulted: Vec<SensorField>,
}

impl DecodedReading {
    pub fn is_complete(&self) -> bool {
        self.defaulted.is_empty()
    }
}

impl SensorReading {
    /// Encode into the nine-register image.
    pub fn encode(&self) -> [u16; REGISTER_COUNT as usize] {
        let mut image = [0u16; REGISTER_COUNT as usize];
        for (offset, value) in [
            (TEMPERATURE_OFFSET, self.temperature),
            (HUMIDITY_OFFSET, self.humidity),
            (PRESSURE_OFFSET, self.pressure),
            (VIBRATION_OFFSET, self.vibration),
        ] {
            image[offset..offset + 2].copy_from_slice(&encode_float(value));
        }
        image[PRODUCTION_OFFSET] = self.production;
        image
    }

    /// Decode a register image. Missing fields become zero and are listed in
    /// [`DecodedReading::defaulted`]; decoding itself never fails.
    pub fn decode(registers: &[u16]) -> DecodedReading {
        let defaulted = SensorField::ALL
            .into_iter()
            .filter(|f| registers.len() < f.offset() + f.width())
            .collect();

        let reading = SensorReading {
            temperature: decode_float_or_default(registers, TEMPERATURE_OFFSET),
            humidity: decode_float_or_default(registers, HUMIDITY_OFFSET),
            pressure: decode_float_or_default(registers, PRESSURE_OFFSET),
            vibration: decode_float_or_default(registers, VIBRATION_OFFSET),
            production: decode_u16(registers, PRODUCTION_OFFSET),
        };

        DecodedReading { reading, defaulted }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_bit_pattern() {
        // 123.456f32 = 0x42F6E979
        assert_eq!(encode_float(123.456), [0x42F6, 0xE979]);
        // 25.5f32 = 0x41CC0000
        assert_eq!(encode_float(25.5), [0x41CC, 0x0000]);
    }

    #[test]
    fn test_decode_is_big_endian() {
        let value = decode_float(&[0x42F6, 0xE979], 0).unwrap();
        assert!((value - 123.456).abs() < 0.001);

        // Swapped word order must not decode to the same value
        let swapped = decode_float(&[0xE979, 0x42F6], 0).unwrap();
        assert!((swapped - 123.456).abs() > 1.0);
    }

    #[test]
    fn test_float_round_trip_is_f32_exact() {
        for v in [
            0.0,
            -0.0,
            1.5,
            -40.125,
            3.2,
            1013.25,
            f64::from(f32::MAX),
            f64::from(f32::MIN_POSITIVE),
            1.0e-3,
            123_456.789,
        ] {
            let registers = encode_float(v);
            let decoded = decode_float(&registers, 0).unwrap();
            assert_eq!(decoded, f64::from(v as f32), "value {v}");
        }
    }

    #[test]
    fn test_decode_out_of_bounds() {
        let registers = [0x41CC];
        assert_eq!(
            decode_float(&registers, 0),
            Err(CodecError::Range {
                index: 0,
                needed: 2,
                available: 1
            })
        );
        assert_eq!(decode_float_or_default(&registers, 0), 0.0);
        assert_eq!(decode_float_or_default(&[], 6), 0.0);
        assert_eq!(decode_float_or_default(&[1, 2, 3], usize::MAX - 1), 0.0);
        assert_eq!(decode_u16(&registers, 8), 0);
    }

    #[test]
    fn test_layout_round_trip() {
        let reading = SensorReading {
            temperature: 25.5,
            humidity: 50.0,
            pressure: 1013.25,
            vibration: 3.2,
            production: 100,
        };

        let image = reading.encode();
        let decoded = SensorReading::decode(&image);

        assert!(decoded.is_complete());
        assert_eq!(decoded.reading.temperature, 25.5);
        assert_eq!(decoded.reading.humidity, 50.0);
        assert_eq!(decoded.reading.pressure, 1013.25);
        assert_eq!(decoded.reading.vibration, f64::from(3.2f32));
        assert_eq!(decoded.reading.production, 100);
    }

    #[test]
    fn test_short_image_defaults_missing_fields() {
        let full = SensorReading {
            temperature: 22.0,
            humidity: 45.0,
            pressure: 1005.0,
            vibration: 1.5,
            production: 75,
        }
        .encode();

        // Vibration's low word and production are missing
        let decoded = SensorReading::decode(&full[..7]);

        assert_eq!(decoded.reading.temperature, 22.0);
        assert_eq!(decoded.reading.pressure, 1005.0);
        assert_eq!(decoded.reading.vibration, 0.0);
        assert_eq!(decoded.reading.production, 0);
        assert_eq!(
            decoded.defaulted,
            vec![SensorField::Vibration, SensorField::Production]
        );
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in SensorField::ALL {
            assert_eq!(SensorField::from_browse_name(field.browse_name()), Some(field));
        }
        assert_eq!(SensorField::from_browse_name("temperature"), None);
    }
}
