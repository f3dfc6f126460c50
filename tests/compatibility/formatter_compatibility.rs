//! Formatter byte-level compatibility tests

use super::{assert_bytes_equal, vector_bytes};
use std::sync::Arc;
use webforms_viewstate::formatter::{
    Color, EnumRepr, EnumValue, EventValidationStore, KnownColor, StateDateTime, StateMap, Unit,
};
use webforms_viewstate::prelude::*;

fn formatter() -> ObjectStateFormatter {
    let mut registry = TypeRegistry::new();
    registry.register_enum(StateType::local("Demo.Mode"), EnumRepr::Int32);
    let provider = DataProtectionProvider::from_key("/compat", &[1u8; 32])
        .expect("Failed to create provider");
    ObjectStateFormatter::new(Arc::new(provider)).with_registry(Arc::new(registry))
}

/// (name, value, expected encoding)
fn vectors() -> Vec<(&'static str, Value, &'static str)> {
    let mut hashtable = StateMap::new();
    hashtable.insert("k", true);

    let mut sparse = TypedArray::with_length(StateType::OBJECT, 5);
    sparse.items[4] = Value::Int32(9);

    vec![
        ("null", Value::Null, "ff01 64"),
        ("empty string", Value::from(""), "ff01 65"),
        ("int32", Value::Int32(300), "ff01 02 ac02"),
        ("negative int32", Value::Int32(-1), "ff01 02 ffffffff0f"),
        (
            "triplet",
            Value::triplet(true, false, Value::Null),
            "ff01 10 67 68 64",
        ),
        ("int16", Value::Int16(0x1234), "ff01 01 3412"),
        ("byte", Value::Byte(255), "ff01 03 ff"),
        ("char", Value::Char('é'), "ff01 04 c3a9"),
        ("double", Value::Double(1.5), "ff01 07 000000000000f83f"),
        ("single", Value::Single(1.5), "ff01 08 0000c03f"),
        (
            "utc date time",
            Value::DateTime(StateDateTime::from_binary(0x4000_0000_0000_0001)),
            "ff01 06 0100000000000040",
        ),
        (
            "argb color",
            Value::Color(Color::from_argb(0xFF, 0x11, 0x22, 0x33)),
            "ff01 09 332211ff",
        ),
        (
            "known color",
            Value::Color(Color::Known(KnownColor::BLACK)),
            "ff01 0a 23",
        ),
        ("empty color", Value::Color(Color::Empty), "ff01 0c"),
        (
            "pixel unit",
            Value::Unit(Unit::pixel(10.0)),
            "ff01 1b 0000000000002440 01000000",
        ),
        ("empty unit", Value::Unit(Unit::Empty), "ff01 1c"),
        (
            "string array",
            Value::Array(TypedArray::strings(["a", "bc"])),
            "ff01 15 02 0161 026263",
        ),
        (
            "hashtable",
            Value::Hashtable(hashtable),
            "ff01 17 01 05016b 67",
        ),
        (
            "empty hybrid dictionary",
            Value::HybridDictionary(StateMap::new()),
            "ff01 18 00",
        ),
        (
            "type",
            Value::Type(StateType::PAIR),
            "ff01 19 2a 12 53797374656d2e5765622e55492e50616972",
        ),
        (
            "int32 array",
            Value::Array(TypedArray::new(StateType::INT32, vec![Value::Int32(1)])),
            "ff01 14 2b01 01 0201",
        ),
        (
            "sparse array",
            Value::Array(sparse),
            "ff01 3c 2b00 05 01 04 0209",
        ),
        (
            "indexed strings",
            Value::List(vec![Value::indexed("k"), Value::indexed("k")]),
            "ff01 16 02 1e016b 1f00",
        ),
        (
            "int enum",
            Value::Enum(EnumValue::int32(StateType::local("Demo.Mode"), 2)),
            "ff01 0b 2a 09 44656d6f2e4d6f6465 02",
        ),
        (
            "empty event validation",
            Value::EventValidation(EventValidationStore::new()),
            "ff01 1d 00 00000000",
        ),
        (
            "pair sample",
            Value::pair("", Value::List(vec![0.into(), "hello".into(), 42.into()])),
            "ff01 0f 65 16 03 66 05 0568656c6c6f 02 2a",
        ),
    ]
}

#[test]
pub fn test_encoding_matches_vectors() {
    let formatter = formatter();
    for (name, value, expected) in vectors() {
        let actual = formatter
            .serialize_raw(&value)
            .unwrap_or_else(|e| panic!("Failed to encode {}: {}", name, e));
        assert_bytes_equal(&actual, &vector_bytes(expected, name), name);
    }
}

#[test]
pub fn test_vectors_decode_to_values() {
    let formatter = formatter();
    for (name, value, expected) in vectors() {
        let decoded = formatter
            .deserialize_raw(&vector_bytes(expected, name))
            .unwrap_or_else(|e| panic!("Failed to decode {}: {}", name, e));
        assert_eq!(decoded, value, "vector {}", name);
    }
}

#[test]
pub fn test_legacy_type_names_resolve() {
    let formatter = formatter();
    let mut bytes = vector_bytes("ff01 19 29", "legacy type");
    let name = b"System.Int16, mscorlib, Version=4.0.0.0, Culture=neutral";
    bytes.push(name.len() as u8);
    bytes.extend_from_slice(name);

    assert_eq!(
        formatter.deserialize_raw(&bytes).expect("Failed to decode"),
        Value::Type(StateType::INT16)
    );
}

#[test]
pub fn test_bad_markers_are_rejected() {
    let formatter = formatter();
    for (name, bytes) in [
        ("no version", vector_bytes("ff", "no version")),
        ("wrong format", vector_bytes("fe01 64", "wrong format")),
        ("wrong version", vector_bytes("ff02 64", "wrong version")),
        ("unknown token", vector_bytes("ff01 0d", "unknown token")),
        ("stray type ref", vector_bytes("ff01 2b00", "stray type ref")),
    ] {
        let error = formatter.deserialize_raw(&bytes).unwrap_err();
        assert!(error.is_invalid_serialized_data(), "{}", name);
    }
}
