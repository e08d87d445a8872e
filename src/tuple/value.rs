use std::fmt::Display;

use super::schema::Type;
use crate::common::STRING_LEN;

const U32_SIZE: usize = std::mem::size_of::<u32>();

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    String(String),
}

impl Value {
    pub fn value_type(&self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::String(_) => Type::String,
        }
    }

    /// Parses a value of `value_type` from the start of `bytes`.
    /// `bytes` must hold at least `value_type.len()` bytes.
    pub fn parse_value(bytes: &[u8], value_type: Type) -> Result<Self, String> {
        match value_type {
            Type::Int => {
                let val = i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                Ok(Value::Int(val))
            }
            Type::String => {
                let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                if len > STRING_LEN {
                    return Err(format!(
                        "string length {len} exceeds the maximum of {STRING_LEN}"
                    ));
                }
                let slice = &bytes[U32_SIZE..U32_SIZE + len];
                let val = std::str::from_utf8(slice)
                    .map_err(|e| format!("string is not valid utf-8: {e}"))?
                    .to_owned();
                Ok(Value::String(val))
            }
        }
    }

    /// Writes the value into the first `self.value_type().len()` bytes of `buffer`.
    /// Strings longer than `STRING_LEN` bytes are cut at the last char boundary that fits.
    pub fn serialize_value(&self, buffer: &mut [u8]) {
        match self {
            Value::Int(val) => buffer[..U32_SIZE].copy_from_slice(val.to_be_bytes().as_slice()),
            Value::String(val) => {
                let bytes = truncated(val).as_bytes();
                buffer[..U32_SIZE].copy_from_slice((bytes.len() as u32).to_be_bytes().as_slice());
                buffer[U32_SIZE..U32_SIZE + bytes.len()].copy_from_slice(bytes);
                buffer[U32_SIZE + bytes.len()..U32_SIZE + STRING_LEN].fill(0);
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(val) => Some(val),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(val) => Some(*val),
            _ => None,
        }
    }
}

fn truncated(val: &str) -> &str {
    if val.len() <= STRING_LEN {
        return val;
    }
    let mut end = STRING_LEN;
    while !val.is_char_boundary(end) {
        end -= 1;
    }
    &val[..end]
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(val) => write!(f, "{val}"),
            Value::String(val) => write!(f, "{val}"),
        }
    }
}
