//! Script numeric encoding: signed 64-bit values represented as little-endian
//! sign-magnitude byte strings, minimally encoded (no superfluous trailing
//! zero byte unless required to disambiguate the sign bit).

use crate::error::VmError;

/// The largest magnitude representable: `i64::MAX`. Values are always
/// decoded into an `i64`; a script number never needs more than 9 bytes
/// (8 magnitude bytes + 1 sign byte in the worst case).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptNum(pub i64);

impl ScriptNum {
    pub fn from_bytes(bytes: &[u8], require_minimal: bool) -> Result<Self, VmError> {
        if bytes.is_empty() {
            return Ok(ScriptNum(0));
        }
        if bytes.len() > 9 {
            return Err(VmError::BadNumericEncoding);
        }
        if require_minimal {
            let last = *bytes.last().unwrap();
            // A trailing 0x00/0x80 byte is only legal if dropping it would
            // flip what the second-to-last byte's high bit means.
            if last & 0x7f == 0 {
                if bytes.len() == 1 || bytes[bytes.len() - 2] & 0x80 == 0 {
                    return Err(VmError::BadNumericEncoding);
                }
            }
        }
        let mut magnitude_bytes = bytes.to_vec();
        let negative = magnitude_bytes.last().map(|b| b & 0x80 != 0).unwrap_or(false);
        if let Some(last) = magnitude_bytes.last_mut() {
            *last &= 0x7f;
        }
        let mut value: i64 = 0;
        for (i, b) in magnitude_bytes.iter().enumerate() {
            value |= (*b as i64) << (8 * i);
        }
        if negative {
            value = -value;
        }
        Ok(ScriptNum(value))
    }

    pub fn to_bytes(self) -> Vec<u8> {
        if self.0 == 0 {
            return Vec::new();
        }
        let negative = self.0 < 0;
        let mut magnitude = self.0.unsigned_abs();
        let mut bytes = Vec::new();
        while magnitude > 0 {
            bytes.push((magnitude & 0xff) as u8);
            magnitude >>= 8;
        }
        if bytes.last().copied().unwrap_or(0) & 0x80 != 0 {
            bytes.push(if negative { 0x80 } else { 0x00 });
        } else if negative {
            *bytes.last_mut().unwrap() |= 0x80;
        }
        bytes
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for ScriptNum {
    fn from(v: i64) -> Self {
        ScriptNum(v)
    }
}

/// Any non-empty, non-all-zero byte string is truthy: "any non-zero byte
/// string is true". A lone sign byte
/// (`0x80`) with nothing else also counts as false, per Bitcoin-style
/// script convention (`-0` is falsy).
pub fn is_true(bytes: &[u8]) -> bool {
    for (i, &b) in bytes.iter().enumerate() {
        if b != 0 {
            if i == bytes.len() - 1 && b == 0x80 {
                return false;
            }
            return true;
        }
    }
    false
}
