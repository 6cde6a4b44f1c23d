//! Dynamically typed property values
//!
//! Remote properties arrive as variants. They are held locally as a tagged
//! union; the typed accessors check the tag and report a
//! [`BluebusError::TypeMismatch`] instead of casting blindly.

use std::collections::BTreeMap;

use crate::error::{BluebusError, BluebusResult};

/// Snapshot of property name to value for one interface
pub type Properties = BTreeMap<String, PropertyValue>;

// ----------------------------------------------------------------------------
// Property Value
// ----------------------------------------------------------------------------

/// A property value as marshalled by the bus transport
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    ObjectPath(String),
    StrList(Vec<String>),
    Bytes(Vec<u8>),
    Array(Vec<PropertyValue>),
    Dict(BTreeMap<String, PropertyValue>),
}

macro_rules! copy_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, property: &str) -> BluebusResult<$ty> {
            match self {
                PropertyValue::$variant(v) => Ok(*v),
                other => Err(other.mismatch(property, stringify!($variant))),
            }
        }
    };
}

impl PropertyValue {
    /// Tag name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "Bool",
            PropertyValue::Byte(_) => "Byte",
            PropertyValue::Int16(_) => "Int16",
            PropertyValue::UInt16(_) => "UInt16",
            PropertyValue::Int32(_) => "Int32",
            PropertyValue::UInt32(_) => "UInt32",
            PropertyValue::Int64(_) => "Int64",
            PropertyValue::UInt64(_) => "UInt64",
            PropertyValue::Double(_) => "Double",
            PropertyValue::Str(_) => "Str",
            PropertyValue::ObjectPath(_) => "ObjectPath",
            PropertyValue::StrList(_) => "StrList",
            PropertyValue::Bytes(_) => "Bytes",
            PropertyValue::Array(_) => "Array",
            PropertyValue::Dict(_) => "Dict",
        }
    }

    fn mismatch(&self, property: &str, expected: &'static str) -> BluebusError {
        BluebusError::TypeMismatch {
            property: property.to_string(),
            expected,
            actual: self.kind(),
        }
    }

    copy_accessor!(as_bool, Bool, bool);
    copy_accessor!(as_byte, Byte, u8);
    copy_accessor!(as_i16, Int16, i16);
    copy_accessor!(as_u16, UInt16, u16);
    copy_accessor!(as_i32, Int32, i32);
    copy_accessor!(as_u32, UInt32, u32);
    copy_accessor!(as_i64, Int64, i64);
    copy_accessor!(as_u64, UInt64, u64);
    copy_accessor!(as_f64, Double, f64);

    /// String contents; object paths are accepted as strings too
    pub fn as_str(&self, property: &str) -> BluebusResult<&str> {
        match self {
            PropertyValue::Str(s) | PropertyValue::ObjectPath(s) => Ok(s),
            other => Err(other.mismatch(property, "Str")),
        }
    }

    /// String list; an empty generic array counts as an empty list
    pub fn as_str_list(&self, property: &str) -> BluebusResult<&[String]> {
        match self {
            PropertyValue::StrList(list) => Ok(list),
            PropertyValue::Array(items) if items.is_empty() => Ok(&[]),
            other => Err(other.mismatch(property, "StrList")),
        }
    }

    pub fn as_bytes(&self, property: &str) -> BluebusResult<&[u8]> {
        match self {
            PropertyValue::Bytes(bytes) => Ok(bytes),
            PropertyValue::Array(items) if items.is_empty() => Ok(&[]),
            other => Err(other.mismatch(property, "Bytes")),
        }
    }

    pub fn as_dict(&self, property: &str) -> BluebusResult<&BTreeMap<String, PropertyValue>> {
        match self {
            PropertyValue::Dict(dict) => Ok(dict),
            other => Err(other.mismatch(property, "Dict")),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i16> for PropertyValue {
    fn from(value: i16) -> Self {
        PropertyValue::Int16(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::StrList(value)
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

impl From<Properties> for PropertyValue {
    fn from(value: Properties) -> Self {
        PropertyValue::Dict(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_accessors() {
        assert!(PropertyValue::Bool(true).as_bool("Connected").unwrap());
        assert_eq!(PropertyValue::Int16(-60).as_i16("RSSI").unwrap(), -60);
        assert_eq!(
            PropertyValue::from("AA:BB:CC:DD:EE:FF").as_str("Address").unwrap(),
            "AA:BB:CC:DD:EE:FF"
        );
        assert_eq!(
            PropertyValue::ObjectPath("/org/bluez/hci0".into())
                .as_str("Adapter")
                .unwrap(),
            "/org/bluez/hci0"
        );
    }

    #[test]
    fn test_mismatch_names_both_kinds() {
        let err = PropertyValue::Str("yes".into()).as_bool("Paired").unwrap_err();
        assert_eq!(
            err,
            BluebusError::TypeMismatch {
                property: "Paired".into(),
                expected: "Bool",
                actual: "Str",
            }
        );
    }

    #[test]
    fn test_empty_array_reads_as_empty_list() {
        let empty = PropertyValue::Array(Vec::new());
        assert!(empty.as_str_list("UUIDs").unwrap().is_empty());
        assert!(empty.as_bytes("Value").unwrap().is_empty());

        let nonempty = PropertyValue::Array(vec![PropertyValue::Bool(true)]);
        assert!(nonempty.as_str_list("UUIDs").is_err());
    }
}
