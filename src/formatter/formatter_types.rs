//! Type identities, the type registry, converters and binary codecs
//!
//! The legacy format names types on the wire. On decode a name is only
//! turned back into a type if the [`TypeRegistry`] knows it; there is no
//! reflection and nothing outside the registry can be instantiated.

use crate::error::ConversionError;
use crate::formatter::formatter_value::{EnumRepr, EnumValue, ObjectRef, StateTyped, Value};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// Assembly that hosts the runtime's core types
pub const CORE_ASSEMBLY: &str = "System.Private.CoreLib";

/// Identity of a type as it appears on the wire
///
/// A type without an assembly is *local*: it lives in the compatibility
/// layer itself and is written with its full name only. Every other type is
/// written with its assembly-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateType {
    name: Cow<'static, str>,
    assembly: Option<Cow<'static, str>>,
}

impl StateType {
    /// `System.Object`, type table seed 0
    pub const OBJECT: StateType = StateType::core("System.Object");
    /// `System.Int32`, type table seed 1
    pub const INT32: StateType = StateType::core("System.Int32");
    /// `System.String`, type table seed 2
    pub const STRING: StateType = StateType::core("System.String");
    /// `System.Boolean`, type table seed 3
    pub const BOOLEAN: StateType = StateType::core("System.Boolean");
    /// `System.Int16`
    pub const INT16: StateType = StateType::core("System.Int16");
    /// `System.Int64`
    pub const INT64: StateType = StateType::core("System.Int64");
    /// `System.Byte`
    pub const BYTE: StateType = StateType::core("System.Byte");
    /// `System.Char`
    pub const CHAR: StateType = StateType::core("System.Char");
    /// `System.Double`
    pub const DOUBLE: StateType = StateType::core("System.Double");
    /// `System.Single`
    pub const SINGLE: StateType = StateType::core("System.Single");
    /// `System.DateTime`
    pub const DATE_TIME: StateType = StateType::core("System.DateTime");
    /// `System.Type`
    pub const TYPE: StateType = StateType::core("System.Type");
    /// `System.Collections.ArrayList`
    pub const ARRAY_LIST: StateType = StateType::core("System.Collections.ArrayList");
    /// `System.Collections.Hashtable`
    pub const HASHTABLE: StateType = StateType::core("System.Collections.Hashtable");
    /// `System.Collections.Specialized.HybridDictionary`
    pub const HYBRID_DICTIONARY: StateType = StateType::from_static(
        "System.Collections.Specialized.HybridDictionary",
        Some("System.Collections.Specialized"),
    );
    /// `System.Drawing.Color`
    pub const COLOR: StateType =
        StateType::from_static("System.Drawing.Color", Some("System.Drawing.Primitives"));
    /// `System.Web.UI.Pair`
    pub const PAIR: StateType = StateType::from_static("System.Web.UI.Pair", None);
    /// `System.Web.UI.Triplet`
    pub const TRIPLET: StateType = StateType::from_static("System.Web.UI.Triplet", None);
    /// `System.Web.UI.WebControls.Unit`
    pub const UNIT: StateType = StateType::from_static("System.Web.UI.WebControls.Unit", None);
    /// `System.Web.UI.EventValidationStore`
    pub const EVENT_VALIDATION_STORE: StateType =
        StateType::from_static("System.Web.UI.EventValidationStore", None);

    /// Build a type identity from static strings
    pub const fn from_static(name: &'static str, assembly: Option<&'static str>) -> Self {
        let assembly = match assembly {
            Some(assembly) => Some(Cow::Borrowed(assembly)),
            None => None,
        };
        Self {
            name: Cow::Borrowed(name),
            assembly,
        }
    }

    const fn core(name: &'static str) -> Self {
        Self::from_static(name, Some(CORE_ASSEMBLY))
    }

    /// A type local to the compatibility layer
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            assembly: None,
        }
    }

    /// A type from another assembly
    pub fn new(name: impl Into<String>, assembly: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            assembly: Some(Cow::Owned(assembly.into())),
        }
    }

    /// Full type name without assembly
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Assembly name, `None` for local types
    pub fn assembly(&self) -> Option<&str> {
        self.assembly.as_deref()
    }

    /// Whether the type is written with the local marker
    pub fn is_local(&self) -> bool {
        self.assembly.is_none()
    }

    /// Name as written on the wire: full name for local types, otherwise
    /// `"Name, Assembly"`
    pub fn qualified_name(&self) -> String {
        match &self.assembly {
            Some(assembly) => format!("{}, {}", self.name, assembly),
            None => self.name.to_string(),
        }
    }

    fn assembly_simple_name(&self) -> Option<&str> {
        self.assembly.as_deref().map(simple_assembly_name)
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Split an assembly-qualified name at its first top-level comma
///
/// Commas inside generic argument brackets belong to the type name.
pub(crate) fn split_qualified_name(text: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    for (index, ch) in text.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                let assembly = text[index + 1..].trim();
                let assembly = (!assembly.is_empty()).then_some(assembly);
                return (text[..index].trim(), assembly);
            }
            _ => {}
        }
    }
    (text.trim(), None)
}

fn simple_assembly_name(assembly: &str) -> &str {
    assembly.split(',').next().unwrap_or(assembly).trim()
}

/// Legacy name of the core assembly, still found in old streams
const LEGACY_CORE_ASSEMBLY: &str = "mscorlib";

fn same_assembly(a: &str, b: &str) -> bool {
    let is_core = |name: &str| name == CORE_ASSEMBLY || name == LEGACY_CORE_ASSEMBLY;
    a == b || (is_core(a) && is_core(b))
}

/// Converts values of one type to and from an invariant-culture string
pub trait TypeConverter: Send + Sync {
    /// Whether the converter goes both to and from strings
    fn can_convert_string(&self) -> bool {
        true
    }

    /// Render a value as its invariant string
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConversionError>;

    /// Rebuild a value of `state_type` from its invariant string
    fn convert_from_invariant_string(
        &self,
        state_type: &StateType,
        text: &str,
    ) -> Result<Value, ConversionError>;
}

/// Encodes values of one type to opaque bytes and back
///
/// Only types registered with a codec can travel through the binary
/// fallback, which keeps that path an explicit allow-list.
pub trait BinaryCodec: Send + Sync {
    /// Encode the object to bytes
    fn encode(&self, value: &ObjectRef) -> Result<Vec<u8>, ConversionError>;

    /// Decode an object from bytes
    fn decode(&self, bytes: &[u8]) -> Result<ObjectRef, ConversionError>;
}

struct Int64Converter;

impl TypeConverter for Int64Converter {
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::Int64(number) => Ok(number.to_string()),
            other => Err(ConversionError::new(format!(
                "expected Int64, got {}",
                other.type_name()
            ))),
        }
    }

    fn convert_from_invariant_string(
        &self,
        _state_type: &StateType,
        text: &str,
    ) -> Result<Value, ConversionError> {
        text.trim()
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| ConversionError::new(format!("invalid Int64 '{}': {}", text, e)))
    }
}

struct EnumConverter {
    repr: EnumRepr,
}

impl TypeConverter for EnumConverter {
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::Enum(enum_value) => Ok(enum_value.value().to_string()),
            other => Err(ConversionError::new(format!(
                "expected an enum, got {}",
                other.type_name()
            ))),
        }
    }

    fn convert_from_invariant_string(
        &self,
        state_type: &StateType,
        text: &str,
    ) -> Result<Value, ConversionError> {
        let number = text
            .trim()
            .parse::<i64>()
            .map_err(|e| ConversionError::new(format!("invalid enum value '{}': {}", text, e)))?;
        EnumValue::new(state_type.clone(), self.repr, number)
            .map(Value::Enum)
            .ok_or_else(|| {
                ConversionError::new(format!("{} out of range for {:?}", number, self.repr))
            })
    }
}

/// Converter for objects that print with [`fmt::Display`] and parse with [`FromStr`]
pub struct ParsedConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParsedConverter<T> {
    /// Create the converter
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for ParsedConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TypeConverter for ParsedConverter<T>
where
    T: StateTyped + fmt::Display + FromStr + PartialEq + fmt::Debug + Send + Sync + 'static,
    T::Err: fmt::Display,
{
    fn convert_to_invariant_string(&self, value: &Value) -> Result<String, ConversionError> {
        match value {
            Value::Object(object) => object
                .downcast_ref::<T>()
                .map(ToString::to_string)
                .ok_or_else(|| {
                    ConversionError::new(format!("object is not a {}", T::state_type()))
                }),
            other => Err(ConversionError::new(format!(
                "expected an object, got {}",
                other.type_name()
            ))),
        }
    }

    fn convert_from_invariant_string(
        &self,
        _state_type: &StateType,
        text: &str,
    ) -> Result<Value, ConversionError> {
        text.parse::<T>()
            .map(|parsed| Value::Object(ObjectRef::new(parsed)))
            .map_err(|e| ConversionError::new(e.to_string()))
    }
}

/// Binary codec backed by `bincode`
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    /// Create the codec
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BinaryCodec for BincodeCodec<T>
where
    T: StateTyped
        + bincode::Encode
        + bincode::Decode<()>
        + PartialEq
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    fn encode(&self, value: &ObjectRef) -> Result<Vec<u8>, ConversionError> {
        let typed = value.downcast_ref::<T>().ok_or_else(|| {
            ConversionError::new(format!("object is not a {}", T::state_type()))
        })?;
        bincode::encode_to_vec(typed, bincode::config::standard())
            .map_err(|e| ConversionError::new(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<ObjectRef, ConversionError> {
        let (decoded, consumed): (T, usize) =
            bincode::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ConversionError::new(e.to_string()))?;
        if consumed != bytes.len() {
            return Err(ConversionError::new(format!(
                "{} trailing bytes after {}",
                bytes.len() - consumed,
                T::state_type()
            )));
        }
        Ok(ObjectRef::new(decoded))
    }
}

/// Everything the registry knows about one type
#[derive(Clone)]
struct TypeEntry {
    state_type: StateType,
    enum_repr: Option<EnumRepr>,
    converter: Option<Arc<dyn TypeConverter>>,
    codec: Option<Arc<dyn BinaryCodec>>,
}

impl TypeEntry {
    fn plain(state_type: StateType) -> Self {
        Self {
            state_type,
            enum_repr: None,
            converter: None,
            codec: None,
        }
    }
}

/// Registry of the types a formatter may resolve by name
#[derive(Clone)]
pub struct TypeRegistry {
    entries: HashMap<String, TypeEntry>,
}

impl TypeRegistry {
    /// Create a registry holding the built-in types
    pub fn new() -> Self {
        let mut registry = Self {
            entries: HashMap::new(),
        };
        registry.register_builtin_types();
        registry
    }

    fn register_builtin_types(&mut self) {
        let builtin_types = [
            StateType::OBJECT,
            StateType::INT32,
            StateType::STRING,
            StateType::BOOLEAN,
            StateType::INT16,
            StateType::BYTE,
            StateType::CHAR,
            StateType::DOUBLE,
            StateType::SINGLE,
            StateType::DATE_TIME,
            StateType::TYPE,
            StateType::ARRAY_LIST,
            StateType::HASHTABLE,
            StateType::HYBRID_DICTIONARY,
            StateType::COLOR,
            StateType::PAIR,
            StateType::TRIPLET,
            StateType::UNIT,
            StateType::EVENT_VALIDATION_STORE,
        ];

        for state_type in builtin_types {
            self.register(state_type);
        }
        self.register_converter(StateType::INT64, Arc::new(Int64Converter));
    }

    /// Register a type that may be resolved by name
    pub fn register(&mut self, state_type: StateType) -> &mut Self {
        self.entry_mut(state_type);
        self
    }

    /// Register an enum type and its underlying representation
    pub fn register_enum(&mut self, state_type: StateType, repr: EnumRepr) -> &mut Self {
        let entry = self.entry_mut(state_type);
        entry.enum_repr = Some(repr);
        entry.converter = Some(Arc::new(EnumConverter { repr }));
        self
    }

    /// Register a string converter for a type
    pub fn register_converter(
        &mut self,
        state_type: StateType,
        converter: Arc<dyn TypeConverter>,
    ) -> &mut Self {
        self.entry_mut(state_type).converter = Some(converter);
        self
    }

    /// Register `T` with a [`ParsedConverter`]
    pub fn register_parsed<T>(&mut self) -> &mut Self
    where
        T: StateTyped + fmt::Display + FromStr + PartialEq + fmt::Debug + Send + Sync + 'static,
        T::Err: fmt::Display,
    {
        self.register_converter(T::state_type(), Arc::new(ParsedConverter::<T>::new()))
    }

    /// Allow `T` through the binary fallback with a [`BincodeCodec`]
    pub fn register_binary<T>(&mut self) -> &mut Self
    where
        T: StateTyped
            + bincode::Encode
            + bincode::Decode<()>
            + PartialEq
            + fmt::Debug
            + Send
            + Sync
            + 'static,
    {
        self.register_codec(T::state_type(), Arc::new(BincodeCodec::<T>::new()))
    }

    /// Allow a type through the binary fallback with a custom codec
    pub fn register_codec(&mut self, state_type: StateType, codec: Arc<dyn BinaryCodec>) -> &mut Self {
        self.entry_mut(state_type).codec = Some(codec);
        self
    }

    fn entry_mut(&mut self, state_type: StateType) -> &mut TypeEntry {
        let key = state_type.name().to_string();
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| TypeEntry::plain(state_type.clone()));
        entry.state_type = state_type;
        entry
    }

    fn entry(&self, state_type: &StateType) -> Option<&TypeEntry> {
        self.entries
            .get(state_type.name())
            .filter(|entry| entry.state_type.is_local() == state_type.is_local())
            .filter(|entry| {
                match (
                    entry.state_type.assembly_simple_name(),
                    state_type.assembly_simple_name(),
                ) {
                    (Some(registered), Some(queried)) => same_assembly(registered, queried),
                    (None, None) => true,
                    _ => false,
                }
            })
    }

    /// Whether the type is registered
    pub fn contains(&self, state_type: &StateType) -> bool {
        self.entry(state_type).is_some()
    }

    /// Resolve a wire name into a registered type
    ///
    /// `local` names are plain full names. Other names are assembly-qualified;
    /// when the assembly part is present its simple name must match.
    pub fn resolve(&self, wire_name: &str, local: bool) -> Option<StateType> {
        if local {
            return self
                .entries
                .get(wire_name)
                .filter(|entry| entry.state_type.is_local())
                .map(|entry| entry.state_type.clone());
        }

        let (name, assembly) = split_qualified_name(wire_name);
        let entry = self.entries.get(name)?;
        if entry.state_type.is_local() {
            return None;
        }
        let registered = entry.state_type.assembly_simple_name().unwrap_or_default();
        match assembly {
            Some(assembly) if !same_assembly(registered, simple_assembly_name(assembly)) => None,
            _ => Some(entry.state_type.clone()),
        }
    }

    /// Underlying representation of a registered enum type
    pub fn enum_repr(&self, state_type: &StateType) -> Option<EnumRepr> {
        self.entry(state_type).and_then(|entry| entry.enum_repr)
    }

    /// String converter registered for a type
    pub fn converter(&self, state_type: &StateType) -> Option<&Arc<dyn TypeConverter>> {
        self.entry(state_type).and_then(|entry| entry.converter.as_ref())
    }

    /// Binary codec registered for a type
    pub fn codec(&self, state_type: &StateType) -> Option<&Arc<dyn BinaryCodec>> {
        self.entry(state_type).and_then(|entry| entry.codec.as_ref())
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}
