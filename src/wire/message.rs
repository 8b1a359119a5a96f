//! Server frames.

use serde::Serialize;
use serde_json::Value as Json;

use crate::page::Batch;

/// Error codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WireError {
    /// No handler for the addressed route.
    NotFound,
}

/// Frame sent to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ServerFrame {
    /// `{"d": [ops]}`
    #[serde(rename = "d")]
    Delta(Vec<Json>),

    /// `{"e": code}`
    #[serde(rename = "e")]
    Error(WireError),

    /// Full page state from `start_sync`, already shaped `{"p":{"c":..}}`.
    #[serde(untagged)]
    Snapshot(Json),
}

impl ServerFrame {
    pub fn delta(batch: &Batch) -> Self {
        Self::Delta(batch.ops().iter().map(|op| op.to_json()).collect())
    }

    pub const fn not_found() -> Self {
        Self::Error(WireError::NotFound)
    }

    /// Serialize to JSON text.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"e":"internal"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::page::ChangeOp;

    #[test]
    fn test_frame_shapes() {
        assert_eq!(ServerFrame::not_found().to_json(), r#"{"e":"not_found"}"#);

        let batch = Batch::new(vec![ChangeOp::Delete { key: "a".into() }, ChangeOp::DropAll]);
        assert_eq!(ServerFrame::delta(&batch).to_json(), r#"{"d":[{"k":"a"},{}]}"#);

        let snapshot = ServerFrame::Snapshot(json!({"p": {"c": {}}}));
        assert_eq!(snapshot.to_json(), r#"{"p":{"c":{}}}"#);
    }

    #[test]
    fn test_delta_matches_batch_json() {
        let batch = Batch::new(vec![ChangeOp::Set {
            path: "c a 0".into(),
            value: json!("x"),
        }]);
        let text = ServerFrame::delta(&batch).to_json();
        assert_eq!(serde_json::from_str::<Json>(&text).unwrap(), batch.to_json());
    }
}
