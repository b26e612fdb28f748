use std::fmt;

use super::error::{RecordError, RecordResult};

/// Represents a column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,         // 4 bytes
    Float,       // 8 bytes
    Char(usize), // n bytes (fixed length)
}

impl DataType {
    /// Get the size in bytes for this data type
    pub fn size(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Float => 8,
            DataType::Char(n) => *n,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}

/// Represents a single column value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f64),
    String(String),
}

impl Value {
    /// Whether this value can be stored in a column of `data_type`
    pub fn fits(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Int(_), DataType::Int) | (Value::Float(_), DataType::Float) => true,
            (Value::String(s), DataType::Char(max_len)) => s.len() <= *max_len,
            _ => false,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Serialize value to bytes.
    /// Strings are zero padded to the declared CHAR width.
    pub fn serialize(&self, data_type: &DataType) -> RecordResult<Vec<u8>> {
        match (self, data_type) {
            (Value::Int(i), DataType::Int) => Ok(i.to_le_bytes().to_vec()),
            (Value::Float(f), DataType::Float) => Ok(f.to_le_bytes().to_vec()),
            (Value::String(s), DataType::Char(max_len)) => {
                let bytes = s.as_bytes();
                if bytes.len() > *max_len {
                    return Err(RecordError::Serialization(format!(
                        "String length {} exceeds max length {}",
                        bytes.len(),
                        max_len
                    )));
                }
                let mut result = vec![0u8; *max_len];
                result[..bytes.len()].copy_from_slice(bytes);
                Ok(result)
            }
            _ => Err(RecordError::TypeMismatch {
                expected: data_type.to_string(),
                actual: format!("{:?}", self),
            }),
        }
    }

    /// Deserialize value from bytes
    pub fn deserialize(bytes: &[u8], data_type: &DataType) -> RecordResult<Self> {
        if bytes.len() != data_type.size() {
            return Err(RecordError::Deserialization(format!(
                "Expected {} bytes for {}, got {}",
                data_type.size(),
                data_type,
                bytes.len()
            )));
        }

        match data_type {
            DataType::Int => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(bytes);
                Ok(Value::Int(i32::from_le_bytes(buf)))
            }
            DataType::Float => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                Ok(Value::Float(f64::from_le_bytes(buf)))
            }
            DataType::Char(_) => {
                // Text ends at the first padding byte
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                let s = String::from_utf8(bytes[..end].to_vec())
                    .map_err(|e| RecordError::Deserialization(format!("Invalid UTF-8: {}", e)))?;
                Ok(Value::String(s))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}
