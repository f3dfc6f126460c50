//! Encoder for the object state format
//!
//! The value graph is walked with an explicit work stack rather than native
//! recursion, so arbitrarily deep graphs cannot overflow the call stack.
//! Children are pushed in reverse so they pop, and are written, left to right.

use crate::error::{EncodeError, EncodeResult, FormatterError, FormatterResult};
use crate::formatter::formatter_tables::{StringSlot, StringWriteTable, TypeWriteTable};
use crate::formatter::formatter_tokens::{Token, MARKER_FORMAT, MARKER_VERSION_1};
use crate::formatter::formatter_types::{StateType, TypeRegistry};
use crate::formatter::formatter_value::{
    Color, EnumRepr, ObjectRef, StateMap, TypedArray, Unit, Value,
};
use crate::formatter::formatter_writer::StateWriter;
use crate::utils::describe_value;
use std::io::Write;

/// One unit of encoder work
enum Pending<'v> {
    /// A value still to be written
    Value(&'v Value),
    /// A sparse array slot index
    Index(usize),
}

/// Writes one value graph with its own type and string tables
pub(crate) struct Encoder<'r, W: Write> {
    registry: &'r TypeRegistry,
    writer: StateWriter<W>,
    types: TypeWriteTable,
    strings: StringWriteTable,
}

impl<'r, W: Write> Encoder<'r, W> {
    pub(crate) fn new(registry: &'r TypeRegistry, sink: W) -> Self {
        Self {
            registry,
            writer: StateWriter::new(sink),
            types: TypeWriteTable::new(),
            strings: StringWriteTable::new(),
        }
    }

    /// Write the markers followed by `root`
    pub(crate) fn encode(&mut self, root: &Value) -> FormatterResult<usize> {
        self.writer.write_u8(MARKER_FORMAT)?;
        self.writer.write_u8(MARKER_VERSION_1)?;

        let mut stack = vec![Pending::Value(root)];
        while let Some(pending) = stack.pop() {
            match pending {
                Pending::Index(index) => self.writer.write_length(index)?,
                Pending::Value(value) => self
                    .write_value(value, &mut stack)
                    .map_err(|source| wrap_failure(value, source))?,
            }
        }

        self.writer.flush()?;
        Ok(self.writer.bytes_written())
    }

    fn write_value<'v>(
        &mut self,
        value: &'v Value,
        stack: &mut Vec<Pending<'v>>,
    ) -> EncodeResult<()> {
        match value {
            Value::Null => self.writer.write_token(Token::Null),
            Value::String(text) if text.is_empty() => self.writer.write_token(Token::EmptyString),
            Value::String(text) => {
                self.writer.write_token(Token::String)?;
                self.writer.write_string(text)
            }
            Value::Int32(0) => self.writer.write_token(Token::ZeroInt32),
            Value::Int32(number) => {
                self.writer.write_token(Token::Int32)?;
                self.writer.write_7bit_i32(*number)
            }
            Value::Bool(true) => self.writer.write_token(Token::True),
            Value::Bool(false) => self.writer.write_token(Token::False),
            Value::Byte(byte) => {
                self.writer.write_token(Token::Byte)?;
                self.writer.write_u8(*byte)
            }
            Value::Char(ch) => {
                self.writer.write_token(Token::Char)?;
                self.writer.write_char(*ch)
            }
            Value::Int16(number) => {
                self.writer.write_token(Token::Int16)?;
                self.writer.write_i16(*number)
            }
            Value::Int64(_) => self.write_converted(&StateType::INT64, value),
            Value::Enum(enum_value) if enum_value.repr() == EnumRepr::Int32 => {
                self.writer.write_token(Token::IntEnum)?;
                self.write_type_ref(enum_value.enum_type())?;
                // range checked when the value was built
                self.writer.write_7bit_i32(enum_value.value() as i32)
            }
            Value::Enum(enum_value) => {
                self.writer.write_token(Token::StringFormatted)?;
                self.write_type_ref(enum_value.enum_type())?;
                self.writer.write_string(&enum_value.value().to_string())
            }
            Value::Double(number) => {
                self.writer.write_token(Token::Double)?;
                self.writer.write_f64(*number)
            }
            Value::Single(number) => {
                self.writer.write_token(Token::Single)?;
                self.writer.write_f32(*number)
            }
            Value::DateTime(instant) => {
                self.writer.write_token(Token::DateTime)?;
                self.writer.write_i64(instant.to_binary())
            }
            Value::Pair(pair) => {
                self.writer.write_token(Token::Pair)?;
                stack.push(Pending::Value(&pair.1));
                stack.push(Pending::Value(&pair.0));
                Ok(())
            }
            Value::Triplet(triplet) => {
                self.writer.write_token(Token::Triplet)?;
                stack.push(Pending::Value(&triplet.2));
                stack.push(Pending::Value(&triplet.1));
                stack.push(Pending::Value(&triplet.0));
                Ok(())
            }
            Value::List(items) => {
                self.writer.write_token(Token::ArrayList)?;
                self.writer.write_length(items.len())?;
                stack.extend(items.iter().rev().map(Pending::Value));
                Ok(())
            }
            Value::Hashtable(map) => self.write_map(Token::Hashtable, map, stack),
            Value::HybridDictionary(map) => self.write_map(Token::HybridDictionary, map, stack),
            Value::Array(array) => self.write_array(array, stack),
            Value::Color(color) => self.write_color(*color),
            Value::Unit(unit) => self.write_unit(*unit),
            Value::IndexedString(text) => match self.strings.lookup_or_add(text) {
                StringSlot::Existing(slot) => {
                    self.writer.write_token(Token::IndexedString)?;
                    self.writer.write_u8(slot)
                }
                StringSlot::Added(_) => {
                    self.writer.write_token(Token::IndexedStringAdd)?;
                    self.writer.write_string(text)
                }
            },
            Value::EventValidation(store) => {
                self.writer.write_token(Token::EventValidationStore)?;
                store.write_to(&mut self.writer)
            }
            Value::Type(state_type) => {
                self.writer.write_token(Token::Type)?;
                self.write_type_ref(state_type)
            }
            Value::Object(object) => self.write_object(value, object),
        }
    }

    fn write_map<'v>(
        &mut self,
        token: Token,
        map: &'v StateMap,
        stack: &mut Vec<Pending<'v>>,
    ) -> EncodeResult<()> {
        if map.contains_key(&Value::Null) {
            return Err(EncodeError::NullKey);
        }
        self.writer.write_token(token)?;
        self.writer.write_length(map.len())?;
        for (key, value) in map.iter().rev() {
            stack.push(Pending::Value(value));
            stack.push(Pending::Value(key));
        }
        Ok(())
    }

    fn write_array<'v>(
        &mut self,
        array: &'v TypedArray,
        stack: &mut Vec<Pending<'v>>,
    ) -> EncodeResult<()> {
        if array.is_dense_string_array() {
            self.writer.write_token(Token::StringArray)?;
            self.writer.write_length(array.len())?;
            for item in &array.items {
                if let Value::String(text) = item {
                    self.writer.write_string(text)?;
                }
            }
            return Ok(());
        }

        let length = array.len();
        let present = array.non_null_count();
        if length > 3 && present < length / 4 + 1 {
            self.writer.write_token(Token::SparseArray)?;
            self.write_type_ref(&array.element_type)?;
            self.writer.write_length(length)?;
            self.writer.write_length(present)?;
            let entries = array
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| !item.is_null());
            for (index, item) in entries.rev() {
                stack.push(Pending::Value(item));
                stack.push(Pending::Index(index));
            }
            return Ok(());
        }

        self.writer.write_token(Token::Array)?;
        self.write_type_ref(&array.element_type)?;
        self.writer.write_length(length)?;
        stack.extend(array.items.iter().rev().map(Pending::Value));
        Ok(())
    }

    fn write_color(&mut self, color: Color) -> EncodeResult<()> {
        match color {
            Color::Empty => self.writer.write_token(Token::EmptyColor),
            Color::Argb(argb) => {
                self.writer.write_token(Token::Color)?;
                self.writer.write_i32(argb)
            }
            Color::Known(known) => {
                self.writer.write_token(Token::KnownColor)?;
                self.writer.write_7bit_i32(known.0)
            }
        }
    }

    fn write_unit(&mut self, unit: Unit) -> EncodeResult<()> {
        match unit {
            Unit::Empty => self.writer.write_token(Token::EmptyUnit),
            Unit::Measure { value, unit_type } => {
                self.writer.write_token(Token::Unit)?;
                self.writer.write_f64(value)?;
                self.writer.write_i32(unit_type as i32)
            }
        }
    }

    /// Write a value through its type's string converter
    fn write_converted(&mut self, state_type: &StateType, value: &Value) -> EncodeResult<()> {
        let converter = self
            .registry
            .converter(state_type)
            .filter(|converter| converter.can_convert_string())
            .ok_or_else(|| EncodeError::NotSerializable {
                type_name: state_type.qualified_name(),
            })?;
        let text = converter
            .convert_to_invariant_string(value)
            .map_err(|source| EncodeError::Conversion {
                type_name: state_type.qualified_name(),
                source,
            })?;

        self.writer.write_token(Token::StringFormatted)?;
        self.write_type_ref(state_type)?;
        self.writer.write_string(&text)
    }

    fn write_object(&mut self, value: &Value, object: &ObjectRef) -> EncodeResult<()> {
        let state_type = object.object_type();
        let convertible = self
            .registry
            .converter(&state_type)
            .is_some_and(|converter| converter.can_convert_string());
        if convertible {
            return self.write_converted(&state_type, value);
        }

        let codec = self
            .registry
            .codec(&state_type)
            .ok_or_else(|| EncodeError::NotSerializable {
                type_name: state_type.qualified_name(),
            })?;
        let payload = codec
            .encode(object)
            .map_err(|source| EncodeError::Conversion {
                type_name: state_type.qualified_name(),
                source,
            })?;

        let mut blob = StateWriter::new(Vec::with_capacity(payload.len() + 64));
        blob.write_string(&state_type.qualified_name())?;
        blob.write_bytes(&payload)?;
        let blob = blob.into_inner();

        self.writer.write_token(Token::BinarySerialized)?;
        self.writer.write_length(blob.len())?;
        self.writer.write_bytes(&blob)
    }

    fn write_type_ref(&mut self, state_type: &StateType) -> EncodeResult<()> {
        if let Some(id) = self.types.get(state_type) {
            self.writer.write_token(Token::TypeRef)?;
            return self.writer.write_length(id);
        }

        self.types.add(state_type.clone());
        if state_type.is_local() {
            self.writer.write_token(Token::TypeRefAddLocal)?;
            self.writer.write_string(state_type.name())
        } else {
            self.writer.write_token(Token::TypeRefAdd)?;
            self.writer.write_string(&state_type.qualified_name())
        }
    }
}

fn wrap_failure(value: &Value, source: EncodeError) -> FormatterError {
    if value.is_null() {
        return FormatterError::Encode(source);
    }
    FormatterError::Serialization {
        value: describe_value(value),
        type_name: value.type_name(),
        source,
    }
}
