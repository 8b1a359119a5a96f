//! Client frame parsing and payload decoding.

use serde_json::{Map, Value as Json};

use crate::core::Expando;

/// What a client frame asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Patch,
    Query,
    Watch,
    Noop,
}

impl Action {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "*" => Some(Self::Patch),
            "@" => Some(Self::Query),
            "+" => Some(Self::Watch),
            "#" => Some(Self::Noop),
            _ => None,
        }
    }
}

/// A parsed client frame. Borrows from the received text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientFrame<'a> {
    pub action: Action,
    pub address: &'a str,
    pub payload: &'a str,
}

impl<'a> ClientFrame<'a> {
    /// Split on the first two spaces. `None` for a wrong token count or an
    /// unknown action; such frames are dropped without reply.
    pub fn parse(text: &'a str) -> Option<Self> {
        let mut tokens = text.splitn(3, ' ');
        let action = Action::from_token(tokens.next()?)?;
        let address = tokens.next()?;
        let payload = tokens.next()?;
        Some(Self {
            action,
            address,
            payload,
        })
    }

    /// Decode the payload as handler input.
    pub fn decode(&self) -> Payload {
        Payload::decode(self.payload)
    }
}

/// Decoded handler input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    pub args: Expando,
    pub events: Expando,
}

impl Payload {
    /// A JSON object becomes the args; anything else is wrapped as
    /// `{"#": raw}`. An object under the `""` key is split off as events.
    pub fn decode(raw: &str) -> Self {
        let mut args = match serde_json::from_str::<Json>(raw) {
            Ok(Json::Object(map)) => map,
            _ => {
                let mut map = Map::new();
                map.insert("#".into(), Json::String(raw.to_string()));
                map
            }
        };

        let events = match args.get("") {
            Some(Json::Object(_)) => match args.shift_remove("") {
                Some(Json::Object(events)) => events,
                _ => Map::new(),
            },
            _ => Map::new(),
        };

        Self {
            args: Expando::from(args),
            events: Expando::from(events),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_frames() {
        let frame = ClientFrame::parse("+ /counter {}").unwrap();
        assert_eq!(frame.action, Action::Watch);
        assert_eq!(frame.address, "/counter");
        assert_eq!(frame.payload, "{}");

        // Payload keeps its spaces.
        let frame = ClientFrame::parse(r#"@ /todo {"new": "buy milk"}"#).unwrap();
        assert_eq!(frame.action, Action::Query);
        assert_eq!(frame.payload, r#"{"new": "buy milk"}"#);

        assert_eq!(ClientFrame::parse("# x y").unwrap().action, Action::Noop);
        assert_eq!(ClientFrame::parse("* /p []").unwrap().action, Action::Patch);
    }

    #[test]
    fn test_malformed_frames_dropped() {
        assert_eq!(ClientFrame::parse(""), None);
        assert_eq!(ClientFrame::parse("+"), None);
        assert_eq!(ClientFrame::parse("+ /counter"), None);
        assert_eq!(ClientFrame::parse("! /counter {}"), None);
        assert_eq!(ClientFrame::parse("++ /counter {}"), None);
    }

    #[test]
    fn test_decode_object() {
        let payload = Payload::decode(r#"{"add": true, "n": 2}"#);
        assert_eq!(payload.args.get("add"), Some(&json!(true)));
        assert_eq!(payload.args.get("n"), Some(&json!(2)));
        assert!(payload.events.is_empty());
    }

    #[test]
    fn test_decode_fallback_wraps_raw() {
        for raw in ["not json", "[1,2]", "3", ""] {
            let payload = Payload::decode(raw);
            assert_eq!(payload.args.get_str("#"), Some(raw));
            assert_eq!(payload.args.len(), 1);
        }
    }

    #[test]
    fn test_decode_splits_events() {
        let payload = Payload::decode(r#"{"": {"plot": {"select": 3}}, "q": 1}"#);
        assert_eq!(payload.events.get("plot"), Some(&json!({"select": 3})));
        assert!(!payload.args.contains(""));
        assert_eq!(payload.args.get("q"), Some(&json!(1)));

        // Non-object under "" stays an arg.
        let payload = Payload::decode(r#"{"": 5}"#);
        assert!(payload.events.is_empty());
        assert_eq!(payload.args.get(""), Some(&json!(5)));
    }
}
