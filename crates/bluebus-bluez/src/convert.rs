//! Marshalling between D-Bus variants and property values

use std::collections::{BTreeMap, HashMap};

use bluebus_core::{BluebusError, BluebusResult, PropertyValue, Signal};
use tracing::debug;
use zbus::message::Type as MessageType;
use zbus::zvariant::{self, Structure, Value};
use zbus::Message;

// ----------------------------------------------------------------------------
// Incoming
// ----------------------------------------------------------------------------

/// Convert a received variant into a property value.
///
/// Variants are unwrapped. Arrays whose elements are all strings or all
/// bytes collapse into `StrList`/`Bytes`; dictionary keys are rendered as
/// strings. Structures become arrays of their fields.
pub fn from_value(value: &Value<'_>) -> PropertyValue {
    match value {
        Value::Bool(v) => PropertyValue::Bool(*v),
        Value::U8(v) => PropertyValue::Byte(*v),
        Value::I16(v) => PropertyValue::Int16(*v),
        Value::U16(v) => PropertyValue::UInt16(*v),
        Value::I32(v) => PropertyValue::Int32(*v),
        Value::U32(v) => PropertyValue::UInt32(*v),
        Value::I64(v) => PropertyValue::Int64(*v),
        Value::U64(v) => PropertyValue::UInt64(*v),
        Value::F64(v) => PropertyValue::Double(*v),
        Value::Str(s) => PropertyValue::Str(s.as_str().to_string()),
        Value::Signature(s) => PropertyValue::Str(s.to_string()),
        Value::ObjectPath(p) => PropertyValue::ObjectPath(p.as_str().to_string()),
        Value::Value(inner) => from_value(inner),
        Value::Array(array) => collapse(array.iter().map(from_value).collect()),
        Value::Dict(dict) => PropertyValue::Dict(
            dict.iter()
                .map(|(key, value)| (key_string(&from_value(key)), from_value(value)))
                .collect(),
        ),
        Value::Structure(structure) => {
            PropertyValue::Array(structure.fields().iter().map(from_value).collect())
        }
        #[allow(unreachable_patterns)]
        other => {
            debug!("unsupported variant {:?}", other.value_signature());
            PropertyValue::Array(Vec::new())
        }
    }
}

fn collapse(items: Vec<PropertyValue>) -> PropertyValue {
    if items.is_empty() {
        return PropertyValue::Array(items);
    }
    if items.iter().all(|item| matches!(item, PropertyValue::Str(_))) {
        return PropertyValue::StrList(
            items
                .into_iter()
                .filter_map(|item| match item {
                    PropertyValue::Str(s) => Some(s),
                    _ => None,
                })
                .collect(),
        );
    }
    if items.iter().all(|item| matches!(item, PropertyValue::Byte(_))) {
        return PropertyValue::Bytes(
            items
                .into_iter()
                .filter_map(|item| match item {
                    PropertyValue::Byte(b) => Some(b),
                    _ => None,
                })
                .collect(),
        );
    }
    PropertyValue::Array(items)
}

fn key_string(key: &PropertyValue) -> String {
    match key {
        PropertyValue::Str(s) | PropertyValue::ObjectPath(s) => s.clone(),
        PropertyValue::Byte(v) => v.to_string(),
        PropertyValue::Int16(v) => v.to_string(),
        PropertyValue::UInt16(v) => v.to_string(),
        PropertyValue::Int32(v) => v.to_string(),
        PropertyValue::UInt32(v) => v.to_string(),
        PropertyValue::Int64(v) => v.to_string(),
        PropertyValue::UInt64(v) => v.to_string(),
        other => format!("{:?}", other),
    }
}

/// Decode a received message into a broadcast signal.
///
/// Non-signal messages and signals without a path, interface or member are
/// dropped. A body that cannot be decoded yields an empty argument list.
pub fn signal_from_message(message: &Message) -> Option<Signal> {
    if message.message_type() != MessageType::Signal {
        return None;
    }
    let header = message.header();
    let path = header.path()?.as_str().to_string();
    let interface = header.interface()?.as_str().to_string();
    let member = header.member()?.as_str().to_string();

    let body = message.body();
    let args = match body.deserialize::<Structure<'_>>() {
        Ok(fields) => fields.fields().iter().map(from_value).collect(),
        Err(e) => {
            debug!("undecodable body for {}.{}: {}", interface, member, e);
            Vec::new()
        }
    };
    Some(Signal::new(path, interface, member, args))
}

// ----------------------------------------------------------------------------
// Outgoing
// ----------------------------------------------------------------------------

fn marshal_error(reason: impl std::fmt::Display) -> BluebusError {
    BluebusError::transport("marshal", reason)
}

/// Convert a property value into a variant for a method argument.
///
/// Mixed arrays and nested dictionaries are sent with variant elements.
pub fn to_value(value: &PropertyValue) -> BluebusResult<Value<'_>> {
    Ok(match value {
        PropertyValue::Bool(v) => Value::Bool(*v),
        PropertyValue::Byte(v) => Value::U8(*v),
        PropertyValue::Int16(v) => Value::I16(*v),
        PropertyValue::UInt16(v) => Value::U16(*v),
        PropertyValue::Int32(v) => Value::I32(*v),
        PropertyValue::UInt32(v) => Value::U32(*v),
        PropertyValue::Int64(v) => Value::I64(*v),
        PropertyValue::UInt64(v) => Value::U64(*v),
        PropertyValue::Double(v) => Value::F64(*v),
        PropertyValue::Str(s) => Value::from(s.as_str()),
        PropertyValue::ObjectPath(p) => {
            let path = zvariant::ObjectPath::try_from(p.as_str()).map_err(marshal_error)?;
            Value::ObjectPath(path)
        }
        PropertyValue::StrList(list) => {
            Value::from(list.iter().map(String::as_str).collect::<Vec<_>>())
        }
        PropertyValue::Bytes(bytes) => Value::from(bytes.clone()),
        PropertyValue::Array(items) => Value::from(
            items
                .iter()
                .map(to_value)
                .collect::<BluebusResult<Vec<_>>>()?,
        ),
        PropertyValue::Dict(map) => Value::from(
            map.iter()
                .map(|(key, item)| Ok((key.clone(), to_value(item)?)))
                .collect::<BluebusResult<HashMap<_, _>>>()?,
        ),
    })
}

/// Marshal an `a{sv}` argument
pub fn to_dict(
    map: &BTreeMap<String, PropertyValue>,
) -> BluebusResult<HashMap<&str, Value<'_>>> {
    map.iter()
        .map(|(key, item)| Ok((key.as_str(), to_value(item)?)))
        .collect()
}
