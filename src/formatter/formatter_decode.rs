//! Decoder for the object state format
//!
//! Open containers are kept on an explicit stack, so nesting is bounded by
//! [`FormatterConfig::max_depth`] alone and never by the call stack.
//! Declared collection lengths are charged against a per-call slot budget
//! before anything is allocated for them.
//!
//! Every structural problem is an error. Problems with individual values
//! whose type cannot be resolved or converted are governed by
//! [`FormatterConfig::throw_on_error_deserializing`]: strict decoding fails,
//! permissive decoding logs a warning and substitutes `Null`.

use crate::error::{ConversionError, DecodeError, DecodeResult};
use crate::formatter::event_validation::EventValidationStore;
use crate::formatter::formatter_tables::{StringReadTable, TypeReadTable};
use crate::formatter::formatter_tokens::{Token, MARKER_FORMAT, MARKER_VERSION_1};
use crate::formatter::formatter_types::{StateType, TypeRegistry};
use crate::formatter::formatter_value::{
    Color, EnumValue, KnownColor, StateDateTime, StateMap, TypedArray, Unit, UnitType, Value,
};
use crate::formatter::formatter_reader::StateReader;
use crate::formatter::FormatterConfig;
use crate::utils::describe_value;
use std::io::Read;
use tracing::warn;

/// Upper bound on capacity reserved from a length prefix
const PREALLOCATION_LIMIT: usize = 1024;

/// Reads one value graph with its own type and string tables
pub(crate) struct Decoder<'a, R: Read> {
    registry: &'a TypeRegistry,
    config: &'a FormatterConfig,
    reader: StateReader<R>,
    types: TypeReadTable,
    strings: StringReadTable,
    slots: usize,
}

/// Result of reading one token
enum Item {
    /// A complete value
    Value(Value),
    /// A container whose children follow
    Open(Frame),
}

/// A container whose children are still being read
enum Frame {
    Tuple {
        items: Vec<Value>,
        arity: usize,
    },
    List {
        items: Vec<Value>,
        count: usize,
    },
    Map {
        hybrid: bool,
        map: StateMap,
        count: usize,
        key: Option<Value>,
    },
    Array {
        element_type: StateType,
        items: Vec<Value>,
        length: usize,
    },
    Sparse {
        array: TypedArray,
        remaining: usize,
        slot: Option<usize>,
    },
}

impl Frame {
    fn tuple(arity: usize) -> Self {
        Frame::Tuple {
            items: Vec::with_capacity(arity),
            arity,
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Frame::Tuple { items, arity } => items.len() == *arity,
            Frame::List { items, count } => items.len() == *count,
            Frame::Map { map, count, key, .. } => key.is_none() && map.len() == *count,
            Frame::Array { items, length, .. } => items.len() == *length,
            Frame::Sparse {
                remaining, slot, ..
            } => *remaining == 0 && slot.is_none(),
        }
    }

    /// Whether the next child must be preceded by its sparse index
    fn needs_index(&self) -> bool {
        matches!(self, Frame::Sparse { remaining, slot: None, .. } if *remaining > 0)
    }

    fn set_index(&mut self, index: i32) -> DecodeResult<()> {
        if let Frame::Sparse { array, slot, .. } = self {
            let length = array.len();
            let position = usize::try_from(index)
                .ok()
                .filter(|position| *position < length)
                .ok_or(DecodeError::SparseIndexOutOfRange { index, length })?;
            *slot = Some(position);
        }
        Ok(())
    }

    /// Take the next child
    fn accept(&mut self, value: Value) -> DecodeResult<()> {
        match self {
            Frame::Tuple { items, .. } | Frame::List { items, .. } | Frame::Array { items, .. } => {
                items.push(value)
            }
            Frame::Map { map, key, .. } => match key.take() {
                None if value.is_null() => return Err(DecodeError::NullKey),
                None if map.contains_key(&value) => {
                    return Err(DecodeError::DuplicateKey(describe_value(&value)))
                }
                None => *key = Some(value),
                Some(existing) => {
                    map.try_insert(existing, value);
                }
            },
            Frame::Sparse {
                array,
                remaining,
                slot,
            } => {
                // later entries for a slot overwrite earlier ones
                if let Some(position) = slot.take() {
                    array.items[position] = value;
                    *remaining -= 1;
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Frame::Tuple { items, .. } => {
                let mut items = items.into_iter();
                let first = items.next().unwrap_or_default();
                let second = items.next().unwrap_or_default();
                match items.next() {
                    Some(third) => Value::triplet(first, second, third),
                    None => Value::pair(first, second),
                }
            }
            Frame::List { items, .. } => Value::List(items),
            Frame::Map { hybrid: true, map, .. } => Value::HybridDictionary(map),
            Frame::Map { map, .. } => Value::Hashtable(map),
            Frame::Array {
                element_type,
                items,
                ..
            } => Value::Array(TypedArray::new(element_type, items)),
            Frame::Sparse { array, .. } => Value::Array(array),
        }
    }
}

impl<'a, R: Read> Decoder<'a, R> {
    pub(crate) fn new(registry: &'a TypeRegistry, config: &'a FormatterConfig, source: R) -> Self {
        Self {
            registry,
            config,
            reader: StateReader::new(source),
            types: TypeReadTable::new(),
            strings: StringReadTable::new(),
            slots: 0,
        }
    }

    /// Check the markers and read the root value
    pub(crate) fn decode(&mut self) -> DecodeResult<Value> {
        self.expect_marker(MARKER_FORMAT)?;
        self.expect_marker(MARKER_VERSION_1)?;
        self.read_graph()
    }

    /// Bytes consumed so far
    pub(crate) fn position(&self) -> usize {
        self.reader.position()
    }

    fn expect_marker(&mut self, expected: u8) -> DecodeResult<()> {
        let actual = self.reader.read_u8()?;
        if actual != expected {
            return Err(DecodeError::InvalidMarker { expected, actual });
        }
        Ok(())
    }

    /// Read one value graph with an explicit stack of open containers
    fn read_graph(&mut self) -> DecodeResult<Value> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            if let Some(frame) = stack.last_mut() {
                if frame.needs_index() {
                    let index = self.reader.read_7bit_i32()?;
                    frame.set_index(index)?;
                }
            }
            if stack.len() > self.config.max_depth {
                return Err(DecodeError::DepthExceeded(self.config.max_depth));
            }

            let mut value = match self.read_item()? {
                Item::Value(value) => value,
                Item::Open(frame) if frame.is_complete() => frame.finish(),
                Item::Open(frame) => {
                    stack.push(frame);
                    continue;
                }
            };

            // hand the value up through every container it completes
            loop {
                let Some(mut frame) = stack.pop() else {
                    return Ok(value);
                };
                frame.accept(value)?;
                if !frame.is_complete() {
                    stack.push(frame);
                    break;
                }
                value = frame.finish();
            }
        }
    }

    /// Read one token and its inline payload
    fn read_item(&mut self) -> DecodeResult<Item> {
        let token = self.reader.read_token()?;

        let value = match token {
            Token::Null => Value::Null,
            Token::EmptyString => Value::String(String::new()),
            Token::ZeroInt32 => Value::Int32(0),
            Token::True => Value::Bool(true),
            Token::False => Value::Bool(false),
            Token::String => Value::String(self.reader.read_string()?),
            Token::Int32 => Value::Int32(self.reader.read_7bit_i32()?),
            Token::Int16 => Value::Int16(self.reader.read_i16()?),
            Token::Byte => Value::Byte(self.reader.read_u8()?),
            Token::Char => Value::Char(self.reader.read_char()?),
            Token::DateTime => Value::DateTime(StateDateTime::from_binary(self.reader.read_i64()?)),
            Token::Double => Value::Double(self.reader.read_f64()?),
            Token::Single => Value::Single(self.reader.read_f32()?),
            Token::Color => Value::Color(Color::Argb(self.reader.read_i32()?)),
            Token::KnownColor => Value::Color(Color::Known(KnownColor(self.reader.read_7bit_i32()?))),
            Token::EmptyColor => Value::Color(Color::Empty),
            Token::Unit => {
                let value = self.reader.read_f64()?;
                let raw = self.reader.read_i32()?;
                let unit_type = UnitType::try_from(raw).map_err(DecodeError::InvalidUnitType)?;
                Value::Unit(Unit::Measure { value, unit_type })
            }
            Token::EmptyUnit => Value::Unit(Unit::Empty),
            Token::Pair => return Ok(Item::Open(Frame::tuple(2))),
            Token::Triplet => return Ok(Item::Open(Frame::tuple(3))),
            Token::ArrayList => {
                let count = self.read_collection_length()?;
                self.charge_slots(count)?;
                return Ok(Item::Open(Frame::List {
                    items: Vec::with_capacity(count.min(PREALLOCATION_LIMIT)),
                    count,
                }));
            }
            Token::Hashtable | Token::HybridDictionary => {
                let count = self.read_collection_length()?;
                self.charge_slots(count)?;
                return Ok(Item::Open(Frame::Map {
                    hybrid: token == Token::HybridDictionary,
                    map: StateMap::with_capacity(count.min(PREALLOCATION_LIMIT)),
                    count,
                    key: None,
                }));
            }
            Token::Array => {
                let element_type = self.read_required_type()?;
                let length = self.read_collection_length()?;
                self.charge_slots(length)?;
                return Ok(Item::Open(Frame::Array {
                    element_type,
                    items: Vec::with_capacity(length.min(PREALLOCATION_LIMIT)),
                    length,
                }));
            }
            Token::StringArray => {
                let length = self.read_collection_length()?;
                self.charge_slots(length)?;
                let mut items = Vec::with_capacity(length.min(PREALLOCATION_LIMIT));
                for _ in 0..length {
                    items.push(Value::String(self.reader.read_string()?));
                }
                Value::Array(TypedArray::new(StateType::STRING, items))
            }
            Token::SparseArray => {
                let element_type = self.read_required_type()?;
                let length = self.read_collection_length()?;
                let count = self.read_collection_length()?;
                if count > length {
                    return Err(DecodeError::SparseCountExceedsLength { count, length });
                }
                // every slot is allocated up front, present or not
                self.charge_slots(length)?;
                return Ok(Item::Open(Frame::Sparse {
                    array: TypedArray::with_length(element_type, length),
                    remaining: count,
                    slot: None,
                }));
            }
            Token::IntEnum => {
                let enum_type = self.read_required_type()?;
                let repr = self
                    .registry
                    .enum_repr(&enum_type)
                    .ok_or_else(|| DecodeError::NotAnEnum(enum_type.qualified_name()))?;
                let number = self.reader.read_7bit_i32()?;
                let type_name = enum_type.qualified_name();
                let enum_value = EnumValue::new(enum_type, repr, i64::from(number)).ok_or_else(
                    || DecodeError::Conversion {
                        type_name,
                        source: ConversionError::new(format!("{} out of range for {:?}", number, repr)),
                    },
                )?;
                Value::Enum(enum_value)
            }
            Token::Type => match self.read_type_ref()? {
                Some(state_type) => Value::Type(state_type),
                None => Value::Null,
            },
            Token::IndexedStringAdd => {
                let text = self.reader.read_string()?;
                self.strings.add(text.clone());
                Value::IndexedString(text)
            }
            Token::IndexedString => {
                let slot = self.reader.read_u8()?;
                let text = self
                    .strings
                    .get(slot)
                    .ok_or(DecodeError::StringIndexOutOfRange(slot))?;
                Value::IndexedString(text.to_string())
            }
            Token::EventValidationStore => Value::EventValidation(EventValidationStore::read_from(
                &mut self.reader,
                self.config.max_collection_length,
            )?),
            Token::StringFormatted => {
                let state_type = self.read_type_ref()?;
                let text = self.reader.read_string()?;
                match state_type {
                    Some(state_type) => self.convert_from_string(&state_type, &text)?,
                    None => Value::Null,
                }
            }
            Token::BinarySerialized => {
                let length = self.reader.read_length(i32::MAX as usize)?;
                let blob = self.reader.read_bytes(length)?;
                match self.read_blob(&blob) {
                    Ok(value) => value,
                    Err(error) => {
                        self.tolerate(error)?;
                        Value::Null
                    }
                }
            }
            Token::TypeRef | Token::TypeRefAdd | Token::TypeRefAddLocal => {
                return Err(DecodeError::UnexpectedToken {
                    token: token.as_byte(),
                    context: "value",
                })
            }
        };
        Ok(Item::Value(value))
    }

    fn read_collection_length(&mut self) -> DecodeResult<usize> {
        self.reader.read_length(self.config.max_collection_length)
    }

    /// Count declared collection slots against the per-call budget
    fn charge_slots(&mut self, slots: usize) -> DecodeResult<()> {
        self.slots = self.slots.saturating_add(slots);
        if self.slots > self.config.max_total_slots {
            return Err(DecodeError::SlotBudgetExceeded {
                limit: self.config.max_total_slots,
            });
        }
        Ok(())
    }

    /// Read a type reference whose type must have resolved
    fn read_required_type(&mut self) -> DecodeResult<StateType> {
        self.read_type_ref()?.ok_or(DecodeError::MissingType)
    }

    /// Read a type reference, growing the table for new types
    ///
    /// Yields `None` for a name that did not resolve under the permissive
    /// policy, and for later references to that slot.
    fn read_type_ref(&mut self) -> DecodeResult<Option<StateType>> {
        let token = self.reader.read_token()?;
        let local = match token {
            Token::TypeRef => {
                let id = self.reader.read_7bit_i32()?;
                return usize::try_from(id)
                    .ok()
                    .and_then(|id| self.types.get(id))
                    .cloned()
                    .ok_or(DecodeError::TypeIndexOutOfRange(id));
            }
            Token::TypeRefAdd => false,
            Token::TypeRefAddLocal => true,
            other => {
                return Err(DecodeError::UnexpectedToken {
                    token: other.as_byte(),
                    context: "type reference",
                })
            }
        };

        let name = self.reader.read_string()?;
        let resolved = self.registry.resolve(&name, local);
        if resolved.is_none() {
            self.tolerate(DecodeError::UnresolvedType(name))?;
        }
        self.types.add(resolved.clone());
        Ok(resolved)
    }

    fn convert_from_string(&self, state_type: &StateType, text: &str) -> DecodeResult<Value> {
        let converted = match self.registry.converter(state_type) {
            Some(converter) => converter.convert_from_invariant_string(state_type, text),
            None => Err(ConversionError::new("no converter registered")),
        };
        match converted {
            Ok(value) => Ok(value),
            Err(source) => {
                self.tolerate(DecodeError::Conversion {
                    type_name: state_type.qualified_name(),
                    source,
                })?;
                Ok(Value::Null)
            }
        }
    }

    /// Decode a binary fallback blob: the type name, then the codec payload
    fn read_blob(&self, blob: &[u8]) -> DecodeResult<Value> {
        let mut reader = StateReader::new(blob);
        let name = reader.read_string()?;
        let state_type = self
            .registry
            .resolve(&name, false)
            .or_else(|| self.registry.resolve(&name, true))
            .ok_or_else(|| DecodeError::UnresolvedType(name.clone()))?;
        let codec = self
            .registry
            .codec(&state_type)
            .ok_or_else(|| DecodeError::BinaryFallback(format!("type '{}' is not allowed", name)))?;
        let object = codec
            .decode(&blob[reader.position()..])
            .map_err(|e| DecodeError::BinaryFallback(e.reason))?;
        Ok(Value::Object(object))
    }

    /// Apply the error policy to a per-value failure
    fn tolerate(&self, error: DecodeError) -> DecodeResult<()> {
        if self.config.throw_on_error_deserializing {
            return Err(error);
        }
        warn!(error = %error, "Substituting null for an unreadable view state value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatter::DEFAULT_MAX_TOTAL_SLOTS;

    fn decode_with(config: &FormatterConfig, bytes: &[u8]) -> DecodeResult<Value> {
        let registry = TypeRegistry::new();
        Decoder::new(&registry, config, bytes).decode()
    }

    fn decode(bytes: &[u8]) -> DecodeResult<Value> {
        decode_with(&FormatterConfig::default(), bytes)
    }

    #[test]
    fn test_markers() {
        assert_eq!(decode(&[0xFF, 0x01, 100]).unwrap(), Value::Null);
        assert!(matches!(
            decode(&[0xFE, 0x01, 100]),
            Err(DecodeError::InvalidMarker { expected: 0xFF, actual: 0xFE })
        ));
        assert!(matches!(
            decode(&[0xFF, 0x02, 100]),
            Err(DecodeError::InvalidMarker { expected: 0x01, actual: 0x02 })
        ));
        assert!(matches!(decode(&[]), Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_unknown_and_misplaced_tokens() {
        assert!(matches!(
            decode(&[0xFF, 0x01, 99]),
            Err(DecodeError::UnknownToken(99))
        ));
        assert!(matches!(
            decode(&[0xFF, 0x01, 43, 0]),
            Err(DecodeError::UnexpectedToken { token: 43, .. })
        ));
        assert!(matches!(
            decode(&[0xFF, 0x01, 20, 100, 0]),
            Err(DecodeError::UnexpectedToken { token: 100, .. })
        ));
    }

    #[test]
    fn test_sparse_validation() {
        // count 5 > length 3
        assert!(matches!(
            decode(&[0xFF, 0x01, 60, 43, 0, 3, 5]),
            Err(DecodeError::SparseCountExceedsLength { count: 5, length: 3 })
        ));
        // index 4 outside length 4
        assert!(matches!(
            decode(&[0xFF, 0x01, 60, 43, 0, 4, 1, 4, 102]),
            Err(DecodeError::SparseIndexOutOfRange { index: 4, length: 4 })
        ));
        // duplicates overwrite
        let value = decode(&[0xFF, 0x01, 60, 43, 1, 4, 2, 1, 2, 5, 1, 2, 6]).unwrap();
        let expected = TypedArray::new(
            StateType::INT32,
            vec![Value::Null, Value::Int32(6), Value::Null, Value::Null],
        );
        assert_eq!(value, Value::Array(expected));
    }

    #[test]
    fn test_type_ref_out_of_range() {
        assert!(matches!(
            decode(&[0xFF, 0x01, 20, 43, 4, 0]),
            Err(DecodeError::TypeIndexOutOfRange(4))
        ));
    }

    #[test]
    fn test_string_slot_out_of_range() {
        assert!(matches!(
            decode(&[0xFF, 0x01, 31, 0]),
            Err(DecodeError::StringIndexOutOfRange(0))
        ));
    }

    #[test]
    fn test_unresolved_type_policy() {
        let mut bytes = vec![0xFF, 0x01, 15, 40, 41, 12];
        bytes.extend_from_slice(b"Evil.Gadget,");
        bytes.extend_from_slice(&[1, b'x', 2, 7]);

        let permissive = decode(&bytes).unwrap();
        assert_eq!(permissive, Value::pair(Value::Null, 7));

        let strict = decode_with(&FormatterConfig::strict(), &bytes);
        assert!(matches!(strict, Err(DecodeError::UnresolvedType(_))));
    }

    #[test]
    fn test_unresolved_array_type_is_malformed() {
        let mut bytes = vec![0xFF, 0x01, 20, 42, 4];
        bytes.extend_from_slice(b"Nope");
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(DecodeError::MissingType)));
    }

    #[test]
    fn test_converter_failure_policy() {
        let name = StateType::INT64.qualified_name();
        let mut bytes = vec![0xFF, 0x01, 40, 41, name.len() as u8];
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&[3, b'a', b'b', b'c']);

        assert_eq!(decode(&bytes).unwrap(), Value::Null);
        assert!(matches!(
            decode_with(&FormatterConfig::strict(), &bytes),
            Err(DecodeError::Conversion { .. })
        ));
    }

    #[test]
    fn test_binary_fallback_not_allowed() {
        let mut blob = vec![4];
        blob.extend_from_slice(b"A, B");
        blob.extend_from_slice(&[1, 2, 3]);
        let mut bytes = vec![0xFF, 0x01, 50, blob.len() as u8];
        bytes.extend_from_slice(&blob);

        assert_eq!(decode(&bytes).unwrap(), Value::Null);
        assert!(decode_with(&FormatterConfig::strict(), &bytes).is_err());
    }

    #[test]
    fn test_int_enum_requires_enum_type() {
        // System.Int32 is not an enum
        assert!(matches!(
            decode(&[0xFF, 0x01, 11, 43, 1, 5]),
            Err(DecodeError::NotAnEnum(_))
        ));
    }

    #[test]
    fn test_invalid_unit_type() {
        let mut bytes = vec![0xFF, 0x01, 27];
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        bytes.extend_from_slice(&42i32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(DecodeError::InvalidUnitType(42))));
    }

    #[test]
    fn test_depth_limit() {
        let config = FormatterConfig {
            max_depth: 8,
            ..FormatterConfig::default()
        };
        let mut shallow = vec![0xFF, 0x01];
        shallow.extend(std::iter::repeat_n([22u8, 1], 8).flatten());
        shallow.push(100);
        assert!(decode_with(&config, &shallow).is_ok());

        let mut deep = vec![0xFF, 0x01];
        deep.extend(std::iter::repeat_n([22u8, 1], 9).flatten());
        deep.push(100);
        assert!(matches!(
            decode_with(&config, &deep),
            Err(DecodeError::DepthExceeded(8))
        ));
    }

    #[test]
    fn test_collection_limit() {
        let config = FormatterConfig {
            max_collection_length: 2,
            ..FormatterConfig::default()
        };
        assert!(matches!(
            decode_with(&config, &[0xFF, 0x01, 22, 3, 100, 100, 100]),
            Err(DecodeError::LengthLimitExceeded { length: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_default_depth_runs_without_recursion() {
        let nested = |depth: usize| {
            let mut bytes = vec![0xFF, 0x01];
            bytes.extend(std::iter::repeat_n([22u8, 1], depth).flatten());
            bytes.push(100);
            bytes
        };
        let limit = FormatterConfig::default().max_depth;

        let mut value = decode(&nested(limit)).unwrap();
        let mut levels = 0;
        while let Value::List(mut items) = value {
            value = items.pop().unwrap();
            levels += 1;
        }
        assert_eq!(levels, limit);

        for depth in [limit + 1, limit + 8, 100_000] {
            assert!(matches!(
                decode(&nested(depth)),
                Err(DecodeError::DepthExceeded(max)) if max == limit
            ));
        }
    }

    #[test]
    fn test_slot_budget() {
        let config = FormatterConfig {
            max_total_slots: 4,
            ..FormatterConfig::default()
        };
        // two lists of two fit, a third slot does not
        let fits = [0xFF, 0x01, 15, 22, 2, 102, 102, 22, 2, 102, 102];
        assert!(decode_with(&config, &fits).is_ok());
        assert!(matches!(
            decode_with(&config, &[0xFF, 0x01, 22, 3, 22, 2, 102, 102, 100, 100]),
            Err(DecodeError::SlotBudgetExceeded { limit: 4 })
        ));
        assert!(matches!(
            decode_with(&config, &[0xFF, 0x01, 24, 5]),
            Err(DecodeError::SlotBudgetExceeded { limit: 4 })
        ));
    }

    #[test]
    fn test_sparse_lengths_count_against_budget() {
        // empty sparse arrays still reserve their declared length
        let header = [60u8, 43, 0, 0x80, 0x80, 0x40, 0];
        let mut bytes = vec![0xFF, 0x01, 22, 64];
        for _ in 0..64 {
            bytes.extend_from_slice(&header);
        }
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::SlotBudgetExceeded { limit: DEFAULT_MAX_TOTAL_SLOTS })
        ));

        let config = FormatterConfig {
            max_total_slots: 16,
            ..FormatterConfig::default()
        };
        match decode_with(&config, &[0xFF, 0x01, 60, 43, 0, 16, 0]).unwrap() {
            Value::Array(array) => assert_eq!(array.len(), 16),
            other => panic!("expected an array, got {:?}", other),
        }
        assert!(matches!(
            decode_with(&config, &[0xFF, 0x01, 60, 43, 0, 17, 0]),
            Err(DecodeError::SlotBudgetExceeded { limit: 16 })
        ));
    }

    #[test]
    fn test_duplicate_map_keys_are_rejected() {
        let bytes = [0xFF, 0x01, 23, 2, 5, 1, b'a', 2, 1, 5, 1, b'a', 2, 2];
        assert!(matches!(decode(&bytes), Err(DecodeError::DuplicateKey(key)) if key.contains('a')));

        // same text under different variants stays distinct
        let mixed = [0xFF, 0x01, 24, 2, 5, 1, b'a', 2, 1, 30, 1, b'a', 2, 2];
        let value = decode(&mixed).unwrap();
        assert_eq!(value.as_map().map(|map| map.len()), Some(2));
    }

    #[test]
    fn test_null_map_key_is_rejected() {
        assert!(matches!(
            decode(&[0xFF, 0x01, 23, 1, 100, 2, 1]),
            Err(DecodeError::NullKey)
        ));
        // null values are fine
        let value = decode(&[0xFF, 0x01, 23, 1, 103, 100]).unwrap();
        assert_eq!(
            value.as_map().and_then(|map| map.get(&Value::Bool(true))),
            Some(&Value::Null)
        );
    }

    #[test]
    fn test_position_tracks_consumed_bytes() {
        let registry = TypeRegistry::new();
        let config = FormatterConfig::default();
        let bytes = [0xFF, 0x01, 2, 0xAC, 0x02, 0xEE];
        let mut decoder = Decoder::new(&registry, &config, &bytes[..]);
        assert_eq!(decoder.decode().unwrap(), Value::Int32(300));
        assert_eq!(decoder.position(), 5);
    }
}
