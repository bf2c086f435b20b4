//! Encoded polyline format used by directions providers.
//!
//! Each coordinate is stored as the zig-zag encoded delta from the previous
//! one, split into 5-bit chunks offset by 63. Latitude comes first.

use crate::models::Coordinate;

pub const DEFAULT_PRECISION: u32 = 5;

const CHUNK_OFFSET: u8 = 63;
const CONTINUATION_BIT: i64 = 0x20;
const CHUNK_MASK: i64 = 0x1f;
const MAX_SHIFT: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("encoded polyline ends in the middle of a value at byte {position}")]
    Truncated { position: usize },
    #[error("invalid character {character:?} at byte {position}")]
    InvalidCharacter { character: char, position: usize },
    #[error("encoded value starting before byte {position} overflows 64 bits")]
    Overflow { position: usize },
    #[error("unsupported precision {0}")]
    Precision(u32),
}

pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, DecodeError> {
    decode_with_precision(encoded, DEFAULT_PRECISION)
}

pub fn decode_with_precision(encoded: &str, precision: u32) -> Result<Vec<Coordinate>, DecodeError> {
    let factor = scale_factor(precision)?;
    let bytes = encoded.as_bytes();
    let mut path = Vec::with_capacity(bytes.len() / 4);
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let (dlat, next) = decode_value(bytes, index)?;
        if next >= bytes.len() {
            return Err(DecodeError::Truncated { position: next });
        }
        let (dlng, next) = decode_value(bytes, next)?;
        index = next;

        lat = lat.wrapping_add(dlat);
        lng = lng.wrapping_add(dlng);
        path.push(Coordinate {
            lat: lat as f64 / factor,
            lng: lng as f64 / factor,
        });
    }

    Ok(path)
}

pub fn encode(path: &[Coordinate], precision: u32) -> Result<String, DecodeError> {
    let factor = scale_factor(precision)?;
    let mut out = String::with_capacity(path.len() * 8);
    let mut prev_lat = 0i64;
    let mut prev_lng = 0i64;

    for coord in path {
        let lat = (coord.lat * factor).round() as i64;
        let lng = (coord.lng * factor).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    Ok(out)
}

fn scale_factor(precision: u32) -> Result<f64, DecodeError> {
    if precision > 10 {
        return Err(DecodeError::Precision(precision));
    }
    Ok(10f64.powi(precision as i32))
}

/// Reads one zig-zag value starting at `start`; returns it with the index past it.
fn decode_value(bytes: &[u8], start: usize) -> Result<(i64, usize), DecodeError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    let mut index = start;

    loop {
        let Some(&byte) = bytes.get(index) else {
            return Err(DecodeError::Truncated { position: index });
        };
        if !(CHUNK_OFFSET..=127).contains(&byte) {
            return Err(DecodeError::InvalidCharacter {
                character: char::from(byte),
                position: index,
            });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow { position: index });
        }

        let chunk = i64::from(byte - CHUNK_OFFSET);
        result |= (chunk & CHUNK_MASK) << shift;
        shift += 5;
        index += 1;

        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let value = if result & 1 == 1 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok((value, index))
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= CONTINUATION_BIT {
        let chunk = (CONTINUATION_BIT | (v & CHUNK_MASK)) as u8 + CHUNK_OFFSET;
        out.push(char::from(chunk));
        v >>= 5;
    }
    out.push(char::from(v as u8 + CHUNK_OFFSET));
}
