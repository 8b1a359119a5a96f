//! Data placeholders.
//!
//! A placeholder reserves a named, typed buffer on the client side. The sign
//! of `size` selects the buffer kind:
//!
//! | size  | kind       | dump tag |
//! |-------|------------|----------|
//! | `0`   | keyed map  | `m`      |
//! | `> 0` | fixed      | `f`      |
//! | `< 0` | circular   | `c`      |
//!
//! Placeholders may only appear as card fields. They are lifted into the
//! `b` buffer list when a card is added to a page.

use serde_json::{Map, Value as Json, json};
use thiserror::Error;

/// Invalid placeholder shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error("fields is empty")]
    EmptyFields,

    #[error("field cannot be empty str")]
    EmptyField,

    #[error("columns must all have the same length")]
    RaggedColumns,

    #[error("either rows or columns must be provided to pack")]
    NothingToPack,
}

/// Buffer kind selected by the sign of the placeholder size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Variable-length buffer addressed by key.
    Map,
    /// Fixed number of row slots.
    Fixed(u64),
    /// Ring buffer keeping the last `n` rows.
    Circular(u64),
}

impl BufferKind {
    pub const fn from_size(size: i64) -> Self {
        match size {
            0 => Self::Map,
            n if n < 0 => Self::Circular(n.unsigned_abs()),
            n => Self::Fixed(n.unsigned_abs()),
        }
    }
}

/// Initial contents of a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Rows {
    /// Positional rows, for fixed and circular buffers.
    List(Vec<Json>),
    /// Key to row, for map buffers.
    Keyed(Map<String, Json>),
}

impl Rows {
    fn is_empty(&self) -> bool {
        match self {
            Self::List(rows) => rows.is_empty(),
            Self::Keyed(rows) => rows.is_empty(),
        }
    }

    fn to_json(&self) -> Json {
        match self {
            Self::List(rows) => Json::Array(rows.clone()),
            Self::Keyed(rows) => Json::Object(rows.clone()),
        }
    }
}

impl From<Vec<Json>> for Rows {
    fn from(rows: Vec<Json>) -> Self {
        Self::List(rows)
    }
}

impl From<Map<String, Json>> for Rows {
    fn from(rows: Map<String, Json>) -> Self {
        Self::Keyed(rows)
    }
}

/// Field names of a placeholder.
///
/// Accepts a list of names or a single space-separated string.
pub trait IntoFields {
    fn into_fields(self) -> Vec<String>;
}

impl IntoFields for &str {
    fn into_fields(self) -> Vec<String> {
        self.split_whitespace().map(str::to_string).collect()
    }
}

impl IntoFields for String {
    fn into_fields(self) -> Vec<String> {
        self.as_str().into_fields()
    }
}

impl IntoFields for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl IntoFields for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl<const N: usize> IntoFields for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

/// A typed, sized buffer descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    fields: Vec<String>,
    size: i64,
    rows: Option<Rows>,
}

/// Create a placeholder with `size` rows of `fields`.
pub fn data(fields: impl IntoFields, size: i64) -> Result<Data, DataError> {
    let fields = checked_fields(fields)?;
    Ok(Data {
        fields,
        size,
        rows: None,
    })
}

impl Data {
    /// Pre-populate with rows.
    pub fn with_rows(mut self, rows: impl Into<Rows>) -> Self {
        self.rows = Some(rows.into());
        self
    }

    /// Pre-populate with columns, transposed into rows.
    ///
    /// Ignored when rows were already given.
    pub fn with_columns(mut self, columns: Vec<Vec<Json>>) -> Result<Self, DataError> {
        if self.rows.as_ref().is_some_and(|r| !r.is_empty()) || columns.is_empty() {
            return Ok(self);
        }
        self.rows = Some(Rows::List(transpose(columns)?));
        Ok(self)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub const fn size(&self) -> i64 {
        self.size
    }

    pub const fn kind(&self) -> BufferKind {
        BufferKind::from_size(self.size)
    }

    /// Serialize to the discriminated buffer record.
    pub fn dump(&self) -> Json {
        let f = Json::from(self.fields.clone());
        match self.rows.as_ref().filter(|r| !r.is_empty()) {
            Some(rows @ Rows::Keyed(_)) => json!({ "m": { "f": f, "d": rows.to_json() } }),
            // Positional rows are never a map buffer, even at size 0.
            Some(rows) => {
                let tag = if self.size < 0 { "c" } else { "f" };
                json!({ tag: { "f": f, "d": rows.to_json() } })
            }
            None => match self.kind() {
                BufferKind::Map => json!({ "m": { "f": f } }),
                BufferKind::Fixed(n) => json!({ "f": { "f": f, "n": n } }),
                BufferKind::Circular(n) => json!({ "c": { "f": f, "n": n } }),
            },
        }
    }
}

/// Pack rows into a compact string: `rows:[fields,rows]`.
pub fn pack_rows(fields: impl IntoFields, rows: &[Json]) -> Result<String, DataError> {
    let fields = checked_fields(fields)?;
    if rows.is_empty() {
        return Err(DataError::NothingToPack);
    }
    Ok(format!("rows:{}", json!([fields, rows])))
}

/// Pack columns into a compact string: `cols:[fields,columns]`.
pub fn pack_columns(fields: impl IntoFields, columns: &[Json]) -> Result<String, DataError> {
    let fields = checked_fields(fields)?;
    if columns.is_empty() {
        return Err(DataError::NothingToPack);
    }
    Ok(format!("cols:{}", json!([fields, columns])))
}

fn checked_fields(fields: impl IntoFields) -> Result<Vec<String>, DataError> {
    let fields = fields.into_fields();
    if fields.is_empty() {
        return Err(DataError::EmptyFields);
    }
    if fields.iter().any(String::is_empty) {
        return Err(DataError::EmptyField);
    }
    Ok(fields)
}

fn transpose(columns: Vec<Vec<Json>>) -> Result<Vec<Json>, DataError> {
    let n = columns[0].len();
    if columns.iter().any(|c| c.len() != n) {
        return Err(DataError::RaggedColumns);
    }
    let rows = (0..n)
        .map(|i| Json::Array(columns.iter().map(|c| c[i].clone()).collect()))
        .collect();
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_kind_sign_switch() {
        assert_eq!(BufferKind::from_size(0), BufferKind::Map);
        assert_eq!(BufferKind::from_size(5), BufferKind::Fixed(5));
        assert_eq!(BufferKind::from_size(-5), BufferKind::Circular(5));
    }

    #[test]
    fn test_dump_without_rows() {
        assert_eq!(data("a b", 0).unwrap().dump(), json!({"m": {"f": ["a", "b"]}}));
        assert_eq!(
            data("a b", 10).unwrap().dump(),
            json!({"f": {"f": ["a", "b"], "n": 10}})
        );
        assert_eq!(
            data("a b", -10).unwrap().dump(),
            json!({"c": {"f": ["a", "b"], "n": 10}})
        );
    }

    #[test]
    fn test_dump_with_rows() {
        let rows = vec![json!([1, 2]), json!([3, 4])];

        let fixed = data(["x", "y"], 2).unwrap().with_rows(rows.clone());
        assert_eq!(fixed.dump(), json!({"f": {"f": ["x", "y"], "d": [[1, 2], [3, 4]]}}));

        let ring = data(["x", "y"], -2).unwrap().with_rows(rows.clone());
        assert_eq!(ring.dump(), json!({"c": {"f": ["x", "y"], "d": [[1, 2], [3, 4]]}}));

        // Positional rows at size 0 still dump as a fixed buffer.
        let unsized_rows = data(["x", "y"], 0).unwrap().with_rows(rows);
        assert!(unsized_rows.dump().get("f").is_some());

        let mut keyed = Map::new();
        keyed.insert("r1".into(), json!([1, 2]));
        let map = data(["x", "y"], 0).unwrap().with_rows(keyed);
        assert_eq!(map.dump(), json!({"m": {"f": ["x", "y"], "d": {"r1": [1, 2]}}}));
    }

    #[test]
    fn test_empty_rows_treated_as_absent() {
        let d = data("a", 3).unwrap().with_rows(Vec::<Json>::new());
        assert_eq!(d.dump(), json!({"f": {"f": ["a"], "n": 3}}));
    }

    #[test]
    fn test_columns_transposed() {
        let d = data("a b", 0)
            .unwrap()
            .with_columns(vec![vec![json!(1), json!(2)], vec![json!("x"), json!("y")]])
            .unwrap();
        assert_eq!(d.dump(), json!({"f": {"f": ["a", "b"], "d": [[1, "x"], [2, "y"]]}}));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let err = data("a b", 0)
            .unwrap()
            .with_columns(vec![vec![json!(1), json!(2)], vec![json!(3)]])
            .unwrap_err();
        assert_eq!(err, DataError::RaggedColumns);
    }

    #[test]
    fn test_field_validation() {
        assert_eq!(data("   ", 0).unwrap_err(), DataError::EmptyFields);
        assert_eq!(data(Vec::<String>::new(), 0).unwrap_err(), DataError::EmptyFields);
        assert_eq!(data(vec!["a", ""], 0).unwrap_err(), DataError::EmptyField);
    }

    #[test]
    fn test_pack() {
        let packed = pack_rows("a b", &[json!([1, 2])]).unwrap();
        assert_eq!(packed, r#"rows:[["a","b"],[[1,2]]]"#);

        let packed = pack_columns(["a"], &[json!([1, 2, 3])]).unwrap();
        assert_eq!(packed, r#"cols:[["a"],[[1,2,3]]]"#);

        assert_eq!(pack_rows("a", &[]).unwrap_err(), DataError::NothingToPack);
    }
}
