//! Card payloads.
//!
//! A [`Card`] is an ordered mapping from field name to [`Value`]. Values are
//! JSON-like, except that a field may also hold a [`Data`] placeholder.

use indexmap::IndexMap;
use serde_json::{Map, Value as Json};

use super::data::Data;

/// A card field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(Card),
    Data(Data),
}

impl Value {
    /// Serialize to JSON, expanding nested placeholders into buffer records.
    pub fn dump(&self) -> Json {
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => Json::Number(n.clone()),
            Self::String(s) => Json::String(s.clone()),
            Self::List(items) => Json::Array(items.iter().map(Self::dump).collect()),
            Self::Map(card) => Json::Object(card.dump()),
            Self::Data(data) => data.dump(),
        }
    }

    pub const fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(b),
            Json::Number(n) => Self::Number(n),
            Json::String(s) => Self::String(s),
            Json::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Json::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Self::Number(n.into())
            }
        }
    )*};
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    /// Non-finite floats have no JSON form and become `null`.
    fn from(f: f64) -> Self {
        serde_json::Number::from_f64(f).map_or(Self::Null, Self::Number)
    }
}

impl From<Data> for Value {
    fn from(data: Data) -> Self {
        Self::Data(data)
    }
}

impl From<Card> for Value {
    fn from(card: Card) -> Self {
        Self::Map(card)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered field mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Card {
    fields: IndexMap<String, Value>,
}

impl Card {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Insert or replace a field, keeping its original position on replace.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Serialize all fields, placeholders included, in order.
    pub fn dump(&self) -> Map<String, Json> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.dump()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Card {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Card {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Build a [`Card`] from `name => value` pairs.
///
/// ```ignore
/// let card = card! { "view" => "markdown", "title" => "Hello" };
/// ```
#[macro_export]
macro_rules! card {
    () => { $crate::core::Card::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut card = $crate::core::Card::new();
        $( card.insert($name, $value); )+
        card
    }};
}

/// Pack any value into a compact string: `data:<json>`.
pub fn pack(value: impl Into<Value>) -> String {
    format!("data:{}", value.into().dump())
}
