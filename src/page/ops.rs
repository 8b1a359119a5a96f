//! Change operations and delta batches.
//!
//! Wire shapes:
//!
//! | op       | json                          |
//! |----------|-------------------------------|
//! | upsert   | `{"k": key, "d": {..}, "b"?: [..]}` |
//! | set      | `{"k": "key a 0 b", "v": value}` |
//! | delete   | `{"k": key}`                  |
//! | drop-all | `{}`                          |

use serde_json::{Map, Value as Json, json};

use crate::core::{KEY_SEP, guard_name};

/// One atomic mutation of a page.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeOp {
    /// Insert or replace the card under `key`.
    Upsert {
        key: String,
        fields: Map<String, Json>,
        buffers: Vec<Json>,
    },
    /// Assign `value` at a space-joined path below a card.
    Set { path: String, value: Json },
    /// Remove the card under `key`.
    Delete { key: String },
    /// Clear the page.
    DropAll,
}

impl ChangeOp {
    pub fn to_json(&self) -> Json {
        match self {
            Self::Upsert {
                key,
                fields,
                buffers,
            } => {
                let mut op = Map::new();
                op.insert("k".into(), Json::String(key.clone()));
                op.insert("d".into(), Json::Object(fields.clone()));
                if !buffers.is_empty() {
                    op.insert("b".into(), Json::Array(buffers.clone()));
                }
                Json::Object(op)
            }
            Self::Set { path, value } => json!({ "k": path, "v": value }),
            Self::Delete { key } => json!({ "k": key }),
            Self::DropAll => json!({}),
        }
    }

    /// Parse an op received from a client.
    ///
    /// Returns `None` for anything that is not a well-formed op with valid keys.
    pub fn from_json(op: &Json) -> Option<Self> {
        let op = op.as_object()?;
        if op.is_empty() {
            return Some(Self::DropAll);
        }
        let k = op.get("k")?.as_str()?;

        if let Some(fields) = op.get("d") {
            guard_name(k).ok()?;
            let fields = fields.as_object()?.clone();
            let buffers = match op.get("b") {
                None => Vec::new(),
                Some(b) => b.as_array()?.clone(),
            };
            return Some(Self::Upsert {
                key: k.to_string(),
                fields,
                buffers,
            });
        }

        if let Some(value) = op.get("v") {
            let mut segments = k.split(KEY_SEP);
            let valid = segments.clone().count() >= 2 && segments.all(|s| guard_name(s).is_ok());
            return valid.then(|| Self::Set {
                path: k.to_string(),
                value: value.clone(),
            });
        }

        guard_name(k).ok()?;
        Some(Self::Delete { key: k.to_string() })
    }

    /// Apply to a page mirror (key to card record).
    ///
    /// Set paths that do not resolve are ignored.
    pub(crate) fn apply(&self, current: &mut Map<String, Json>) {
        match self {
            Self::Upsert {
                key,
                fields,
                buffers,
            } => {
                let mut card = Map::new();
                card.insert("d".into(), Json::Object(fields.clone()));
                if !buffers.is_empty() {
                    card.insert("b".into(), Json::Array(buffers.clone()));
                }
                current.insert(key.clone(), Json::Object(card));
            }
            Self::Set { path, value } => {
                let mut segments = path.split(KEY_SEP);
                let Some(key) = segments.next() else { return };
                let Some(root) = current.get_mut(key).and_then(|card| card.get_mut("d")) else {
                    return;
                };
                set_at(root, segments.collect(), value.clone());
            }
            Self::Delete { key } => {
                current.shift_remove(key);
            }
            Self::DropAll => current.clear(),
        }
    }
}

/// Walk `segments` below `node` and assign the leaf.
///
/// Objects accept any name as the leaf. Arrays accept an in-range index.
fn set_at(node: &mut Json, segments: Vec<&str>, value: Json) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };
    let mut node = node;
    for segment in parents {
        let next = match node {
            Json::Object(map) => map.get_mut(*segment),
            Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get_mut(i)),
            _ => None,
        };
        match next {
            Some(child) => node = child,
            None => return,
        }
    }
    match node {
        Json::Object(map) => {
            map.insert((*leaf).to_string(), value);
        }
        Json::Array(items) => {
            if let Some(slot) = leaf.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
                *slot = value;
            }
        }
        _ => {}
    }
}

/// The ops drained by one `save()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    ops: Vec<ChangeOp>,
}

impl Batch {
    pub fn new(ops: Vec<ChangeOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[ChangeOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// `{"d": [ops...]}`
    pub fn to_json(&self) -> Json {
        json!({ "d": self.ops.iter().map(ChangeOp::to_json).collect::<Vec<_>>() })
    }

    /// Parse a client patch: `{"d": [ops]}` or a bare op list.
    ///
    /// Invalid ops are skipped.
    pub fn from_json(patch: &Json) -> Self {
        let ops = match patch {
            Json::Array(ops) => ops,
            Json::Object(map) => match map.get("d") {
                Some(Json::Array(ops)) => ops,
                _ => return Self::default(),
            },
            _ => return Self::default(),
        };
        Self::new(ops.iter().filter_map(ChangeOp::from_json).collect())
    }
}

impl IntoIterator for Batch {
    type Item = ChangeOp;
    type IntoIter = std::vec::IntoIter<ChangeOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upsert(key: &str, fields: Json) -> ChangeOp {
        ChangeOp::Upsert {
            key: key.into(),
            fields: fields.as_object().unwrap().clone(),
            buffers: Vec::new(),
        }
    }

    #[test]
    fn test_op_shapes() {
        assert_eq!(
            upsert("hello", json!({"title": "Hello"})).to_json(),
            json!({"k": "hello", "d": {"title": "Hello"}})
        );
        assert_eq!(ChangeOp::Delete { key: "a".into() }.to_json(), json!({"k": "a"}));
        assert_eq!(ChangeOp::DropAll.to_json(), json!({}));
        let set = ChangeOp::Set {
            path: "a items 0".into(),
            value: json!(3),
        };
        assert_eq!(set.to_json(), json!({"k": "a items 0", "v": 3}));
    }

    #[test]
    fn test_from_json_classifies() {
        assert_eq!(ChangeOp::from_json(&json!({})), Some(ChangeOp::DropAll));
        assert_eq!(
            ChangeOp::from_json(&json!({"k": "x"})),
            Some(ChangeOp::Delete { key: "x".into() })
        );
        assert_eq!(
            ChangeOp::from_json(&json!({"k": "x", "d": {"a": 1}})),
            Some(upsert("x", json!({"a": 1})))
        );
        assert!(matches!(
            ChangeOp::from_json(&json!({"k": "x a", "v": 1})),
            Some(ChangeOp::Set { .. })
        ));
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert_eq!(ChangeOp::from_json(&json!(1)), None);
        assert_eq!(ChangeOp::from_json(&json!({"d": {}})), None);
        assert_eq!(ChangeOp::from_json(&json!({"k": "a b", "d": {}})), None);
        assert_eq!(ChangeOp::from_json(&json!({"k": "a", "d": 1})), None);
        assert_eq!(ChangeOp::from_json(&json!({"k": "a", "v": 1})), None);
        assert_eq!(ChangeOp::from_json(&json!({"k": "a  b", "v": 1})), None);
    }

    #[test]
    fn test_apply_replays_in_order() {
        let mut current = Map::new();
        upsert("a", json!({"n": 1})).apply(&mut current);
        upsert("b", json!({"n": 2})).apply(&mut current);
        upsert("a", json!({"n": 3})).apply(&mut current);
        assert_eq!(
            Json::Object(current.clone()),
            json!({"a": {"d": {"n": 3}}, "b": {"d": {"n": 2}}})
        );

        ChangeOp::Delete { key: "a".into() }.apply(&mut current);
        assert_eq!(Json::Object(current.clone()), json!({"b": {"d": {"n": 2}}}));

        ChangeOp::DropAll.apply(&mut current);
        assert!(current.is_empty());
    }

    #[test]
    fn test_apply_set_walks_path() {
        let mut current = Map::new();
        upsert("c", json!({"items": [{"label": "x"}, {"label": "y"}]})).apply(&mut current);

        ChangeOp::Set {
            path: "c items 1 label".into(),
            value: json!("z"),
        }
        .apply(&mut current);
        assert_eq!(current["c"]["d"]["items"][1]["label"], json!("z"));

        // Unresolved paths are ignored.
        let before = current.clone();
        for path in ["missing a", "c nope x", "c items 9 label"] {
            ChangeOp::Set {
                path: path.into(),
                value: json!(0),
            }
            .apply(&mut current);
        }
        assert_eq!(current, before);
    }

    #[test]
    fn test_batch_parse() {
        let batch = Batch::from_json(&json!({"d": [{"k": "a"}, 5, {}]}));
        assert_eq!(batch.len(), 2);
        assert_eq!(Batch::from_json(&json!([{"k": "a"}])).len(), 1);
        assert!(Batch::from_json(&json!("x")).is_empty());
        assert_eq!(
            Batch::new(vec![ChangeOp::DropAll]).to_json(),
            json!({"d": [{}]})
        );
    }
}
