//! The value model carried by view state
//!
//! [`Value`] is a closed union over everything the object state format can
//! express natively, plus [`Value::Object`] for custom types that travel
//! through a registered converter or binary codec.

use crate::formatter::event_validation::EventValidationStore;
use crate::formatter::formatter_types::StateType;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Associates a Rust type with its wire type identity
pub trait StateTyped {
    /// The wire identity of the implementing type
    fn state_type() -> StateType;
}

/// A custom object stored in view state
///
/// Implemented for every `StateTyped + PartialEq + Debug + Send + Sync` type;
/// implement [`StateTyped`] instead of this trait.
pub trait StateObject: Any + fmt::Debug + Send + Sync {
    /// Wire identity of the object's type
    fn object_type(&self) -> StateType;

    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Equality against another state object
    fn eq_object(&self, other: &dyn StateObject) -> bool;
}

impl<T> StateObject for T
where
    T: StateTyped + PartialEq + fmt::Debug + Send + Sync + 'static,
{
    fn object_type(&self) -> StateType {
        T::state_type()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_object(&self, other: &dyn StateObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

/// Shared handle to a custom state object
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn StateObject>);

impl ObjectRef {
    /// Wrap an object
    pub fn new<T: StateObject>(object: T) -> Self {
        Self(Arc::new(object))
    }

    /// Wire identity of the wrapped object's type
    pub fn object_type(&self) -> StateType {
        self.0.object_type()
    }

    /// Borrow the object as `T` if it is one
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_object(other.0.as_ref())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Underlying storage of an enum type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumRepr {
    /// 8-bit unsigned
    Byte,
    /// 16-bit signed
    Int16,
    /// 32-bit signed, encoded with the compact enum token
    Int32,
    /// 64-bit signed
    Int64,
}

impl EnumRepr {
    /// Whether `value` fits this representation
    pub fn contains(self, value: i64) -> bool {
        match self {
            EnumRepr::Byte => u8::try_from(value).is_ok(),
            EnumRepr::Int16 => i16::try_from(value).is_ok(),
            EnumRepr::Int32 => i32::try_from(value).is_ok(),
            EnumRepr::Int64 => true,
        }
    }
}

/// A typed enum value
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    enum_type: StateType,
    repr: EnumRepr,
    value: i64,
}

impl EnumValue {
    /// Create an enum value, `None` if `value` does not fit `repr`
    pub fn new(enum_type: StateType, repr: EnumRepr, value: i64) -> Option<Self> {
        repr.contains(value).then_some(Self {
            enum_type,
            repr,
            value,
        })
    }

    /// Create an Int32-backed enum value
    pub fn int32(enum_type: StateType, value: i32) -> Self {
        Self {
            enum_type,
            repr: EnumRepr::Int32,
            value: i64::from(value),
        }
    }

    /// The enum type
    pub fn enum_type(&self) -> &StateType {
        &self.enum_type
    }

    /// The underlying representation
    pub fn repr(&self) -> EnumRepr {
        self.repr
    }

    /// The numeric value
    pub fn value(&self) -> i64 {
        self.value
    }
}

const TICKS_MASK: i64 = 0x3FFF_FFFF_FFFF_FFFF;
const KIND_UTC: i64 = 0x4000_0000_0000_0000;
const KIND_SHIFT: u32 = 62;
const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: i64 = 100;
const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;
const MAX_TICKS: i64 = 3_155_378_975_999_999_999;

/// Kind bits of a [`StateDateTime`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeKind {
    /// No time zone information
    Unspecified,
    /// Coordinated universal time
    Utc,
    /// Local time of the machine that produced it
    Local,
}

/// A date/time instant in the legacy 64-bit binary form
///
/// The top two bits hold the kind, the rest are 100ns ticks since
/// 0001-01-01T00:00:00. The raw value is kept as-is so that every instant,
/// local ones included, survives a round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateDateTime(i64);

impl StateDateTime {
    /// Wrap a raw binary value
    pub fn from_binary(bits: i64) -> Self {
        Self(bits)
    }

    /// The raw binary value
    pub fn to_binary(self) -> i64 {
        self.0
    }

    /// A UTC instant, `None` outside years 1..=9999
    pub fn from_utc(instant: DateTime<Utc>) -> Option<Self> {
        let ticks = instant
            .timestamp()
            .checked_mul(TICKS_PER_SECOND)?
            .checked_add(i64::from(instant.timestamp_subsec_nanos()) / NANOS_PER_TICK)?
            .checked_add(UNIX_EPOCH_TICKS)?;
        (0..=MAX_TICKS)
            .contains(&ticks)
            .then_some(Self(ticks | KIND_UTC))
    }

    /// The kind bits
    pub fn kind(self) -> DateTimeKind {
        match (self.0 as u64) >> KIND_SHIFT {
            0 => DateTimeKind::Unspecified,
            1 => DateTimeKind::Utc,
            _ => DateTimeKind::Local,
        }
    }

    /// 100ns ticks since 0001-01-01
    pub fn ticks(self) -> i64 {
        self.0 & TICKS_MASK
    }

    /// The instant as UTC; unspecified instants are read as UTC and local
    /// instants, whose offset is not recorded, yield `None`
    pub fn to_utc(self) -> Option<DateTime<Utc>> {
        if self.kind() == DateTimeKind::Local {
            return None;
        }
        let since_epoch = self.ticks() - UNIX_EPOCH_TICKS;
        let seconds = since_epoch.div_euclid(TICKS_PER_SECOND);
        let nanos = since_epoch.rem_euclid(TICKS_PER_SECOND) * NANOS_PER_TICK;
        DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
    }
}

/// A well-known named color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KnownColor(pub i32);

impl KnownColor {
    /// Transparent
    pub const TRANSPARENT: KnownColor = KnownColor(27);
    /// AliceBlue
    pub const ALICE_BLUE: KnownColor = KnownColor(28);
    /// Black
    pub const BLACK: KnownColor = KnownColor(35);
    /// Blue
    pub const BLUE: KnownColor = KnownColor(37);
}

/// A color value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    /// No color
    Empty,
    /// Explicit ARGB value
    Argb(i32),
    /// A well-known color
    Known(KnownColor),
}

impl Color {
    /// Build an explicit color from its components
    pub fn from_argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Color::Argb(i32::from_be_bytes([alpha, red, green, blue]))
    }
}

/// Unit kind of a [`Unit`] measurement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UnitType {
    /// Pixels
    Pixel = 1,
    /// Points
    Point = 2,
    /// Picas
    Pica = 3,
    /// Inches
    Inch = 4,
    /// Millimetres
    Mm = 5,
    /// Centimetres
    Cm = 6,
    /// Percentage of the parent
    Percentage = 7,
    /// Font size of the element
    Em = 8,
    /// Height of the element's lowercase x
    Ex = 9,
}

impl TryFrom<i32> for UnitType {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => UnitType::Pixel,
            2 => UnitType::Point,
            3 => UnitType::Pica,
            4 => UnitType::Inch,
            5 => UnitType::Mm,
            6 => UnitType::Cm,
            7 => UnitType::Percentage,
            8 => UnitType::Em,
            9 => UnitType::Ex,
            other => return Err(other),
        })
    }
}

/// A length measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unit {
    /// No measurement
    Empty,
    /// A magnitude in a unit
    Measure {
        /// Magnitude
        value: f64,
        /// Unit kind
        unit_type: UnitType,
    },
}

impl Unit {
    /// A pixel measurement
    pub fn pixel(value: f64) -> Self {
        Unit::Measure {
            value,
            unit_type: UnitType::Pixel,
        }
    }

    /// A percentage measurement
    pub fn percentage(value: f64) -> Self {
        Unit::Measure {
            value,
            unit_type: UnitType::Percentage,
        }
    }
}

/// Ordered Value→Value map
///
/// Entries keep insertion order so equal maps always encode to equal bytes.
/// Keys are indexed by a hash of their content; float keys hash by their
/// bits with both zeros folded together, composite keys by variant only.
#[derive(Clone, Default)]
pub struct StateMap {
    entries: Vec<(Value, Value)>,
    buckets: HashMap<u64, Vec<usize>>,
}

impl StateMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty map with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            buckets: HashMap::with_capacity(capacity),
        }
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.buckets
            .get(&key_hash(key))?
            .iter()
            .copied()
            .find(|&index| self.entries[index].0 == *key)
    }

    fn append(&mut self, key: Value, value: Value) {
        self.buckets
            .entry(key_hash(&key))
            .or_default()
            .push(self.entries.len());
        self.entries.push((key, value));
    }

    /// Insert or replace; returns the previous value for the key
    pub fn insert(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, value)),
            None => {
                self.append(key, value);
                None
            }
        }
    }

    /// Look up a key
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    /// Look up a string key, plain or indexed
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.get(&Value::String(key.to_string()))
            .or_else(|| self.get(&Value::IndexedString(key.to_string())))
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&Value, &Value)> + ExactSizeIterator {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    /// Append an entry only if its key is absent; returns whether it was added
    pub fn try_insert(&mut self, key: Value, value: Value) -> bool {
        if self.contains_key(&key) {
            return false;
        }
        self.append(key, value);
        true
    }
}

impl fmt::Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for StateMap {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<Value>, V: Into<Value>> FromIterator<(K, V)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = StateMap::with_capacity(iter.size_hint().0);
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}

/// Hash consistent with `Value`'s equality
fn key_hash(key: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    std::mem::discriminant(key).hash(&mut hasher);
    match key {
        Value::String(text) | Value::IndexedString(text) => text.hash(&mut hasher),
        Value::Int32(number) => number.hash(&mut hasher),
        Value::Bool(flag) => flag.hash(&mut hasher),
        Value::Byte(byte) => byte.hash(&mut hasher),
        Value::Char(ch) => ch.hash(&mut hasher),
        Value::Int16(number) => number.hash(&mut hasher),
        Value::Int64(number) => number.hash(&mut hasher),
        Value::Enum(enum_value) => {
            enum_value.enum_type().hash(&mut hasher);
            enum_value.value().hash(&mut hasher);
        }
        // 0.0 == -0.0
        Value::Double(number) => (*number + 0.0).to_bits().hash(&mut hasher),
        Value::Single(number) => (*number + 0.0).to_bits().hash(&mut hasher),
        Value::DateTime(instant) => instant.hash(&mut hasher),
        Value::Color(color) => color.hash(&mut hasher),
        Value::Type(state_type) => state_type.hash(&mut hasher),
        _ => {}
    }
    hasher.finish()
}

/// A one-dimensional array with a declared element type
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    /// Declared element type
    pub element_type: StateType,
    /// Slots, `Value::Null` for empty ones
    pub items: Vec<Value>,
}

impl TypedArray {
    /// Create an array from its slots
    pub fn new(element_type: StateType, items: Vec<Value>) -> Self {
        Self {
            element_type,
            items,
        }
    }

    /// An array of `length` null slots
    pub fn with_length(element_type: StateType, length: usize) -> Self {
        Self::new(element_type, vec![Value::Null; length])
    }

    /// A string array
    pub fn strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            StateType::STRING,
            strings
                .into_iter()
                .map(|s| Value::String(s.into()))
                .collect(),
        )
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the array has no slots
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of non-null slots
    pub fn non_null_count(&self) -> usize {
        self.items.iter().filter(|item| !item.is_null()).count()
    }

    /// Whether this is a string array with no null slot
    pub fn is_dense_string_array(&self) -> bool {
        self.element_type == StateType::STRING
            && self.items.iter().all(|item| matches!(item, Value::String(_)))
    }
}

/// A value in a view state graph
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null
    #[default]
    Null,
    /// String
    String(String),
    /// 32-bit integer
    Int32(i32),
    /// Boolean
    Bool(bool),
    /// Byte
    Byte(u8),
    /// Character
    Char(char),
    /// 16-bit integer
    Int16(i16),
    /// 64-bit integer
    Int64(i64),
    /// Typed enum value
    Enum(EnumValue),
    /// 64-bit float
    Double(f64),
    /// 32-bit float
    Single(f32),
    /// Date/time instant
    DateTime(StateDateTime),
    /// Two heterogeneous slots
    Pair(Box<(Value, Value)>),
    /// Three heterogeneous slots
    Triplet(Box<(Value, Value, Value)>),
    /// Growable list
    List(Vec<Value>),
    /// Hash map
    Hashtable(StateMap),
    /// Small-map-optimised dictionary
    HybridDictionary(StateMap),
    /// Typed array
    Array(TypedArray),
    /// Color
    Color(Color),
    /// Measurement
    Unit(Unit),
    /// String deduplicated through the string table
    IndexedString(String),
    /// Event validation hash store
    EventValidation(EventValidationStore),
    /// A type value
    Type(StateType),
    /// Custom object
    Object(ObjectRef),
}

impl Value {
    /// Build a pair
    pub fn pair(first: impl Into<Value>, second: impl Into<Value>) -> Self {
        Value::Pair(Box::new((first.into(), second.into())))
    }

    /// Build a triplet
    pub fn triplet(
        first: impl Into<Value>,
        second: impl Into<Value>,
        third: impl Into<Value>,
    ) -> Self {
        Value::Triplet(Box::new((first.into(), second.into(), third.into())))
    }

    /// Build an indexed string
    pub fn indexed(text: impl Into<String>) -> Self {
        Value::IndexedString(text.into())
    }

    /// Build a custom object value
    pub fn object<T: StateObject>(object: T) -> Self {
        Value::Object(ObjectRef::new(object))
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Text of a `String` or `IndexedString`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) | Value::IndexedString(text) => Some(text),
            _ => None,
        }
    }

    /// Value of an `Int32`
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(number) => Some(*number),
            _ => None,
        }
    }

    /// Items of a `List`
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Slots of a `Pair`
    pub fn as_pair(&self) -> Option<(&Value, &Value)> {
        match self {
            Value::Pair(pair) => Some((&pair.0, &pair.1)),
            _ => None,
        }
    }

    /// Entries of a `Hashtable` or `HybridDictionary`
    pub fn as_map(&self) -> Option<&StateMap> {
        match self {
            Value::Hashtable(map) | Value::HybridDictionary(map) => Some(map),
            _ => None,
        }
    }

    /// Type name used in diagnostics
    pub fn type_name(&self) -> String {
        let state_type = match self {
            Value::Null => return "null".to_string(),
            Value::String(_) => StateType::STRING,
            Value::Int32(_) => StateType::INT32,
            Value::Bool(_) => StateType::BOOLEAN,
            Value::Byte(_) => StateType::BYTE,
            Value::Char(_) => StateType::CHAR,
            Value::Int16(_) => StateType::INT16,
            Value::Int64(_) => StateType::INT64,
            Value::Enum(value) => value.enum_type().clone(),
            Value::Double(_) => StateType::DOUBLE,
            Value::Single(_) => StateType::SINGLE,
            Value::DateTime(_) => StateType::DATE_TIME,
            Value::Pair(_) => StateType::PAIR,
            Value::Triplet(_) => StateType::TRIPLET,
            Value::List(_) => StateType::ARRAY_LIST,
            Value::Hashtable(_) => StateType::HASHTABLE,
            Value::HybridDictionary(_) => StateType::HYBRID_DICTIONARY,
            Value::Array(array) => return format!("{}[]", array.element_type.qualified_name()),
            Value::Color(_) => StateType::COLOR,
            Value::Unit(_) => StateType::UNIT,
            Value::IndexedString(_) => StateType::local("System.Web.UI.IndexedString"),
            Value::EventValidation(_) => StateType::EVENT_VALIDATION_STORE,
            Value::Type(_) => StateType::TYPE,
            Value::Object(object) => object.object_type(),
        };
        state_type.qualified_name()
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<i32> for Value {
    fn from(number: i32) -> Self {
        Value::Int32(number)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Value::Int64(number)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Bool(flag)
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::Double(number)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(option: Option<T>) -> Self {
        option.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
