//! JSON frames exchanged with the evaluation service
//!
//! Client to service: a handshake (empty object, first frame after
//! connect) or a mutation carrying an id plus the full input snapshot.
//! Service to client: a [`Response`] echoing the id that produced it,
//! with the evaluated parameter list and any diagnostics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Diagnostic, Parameter};

/// A mutation frame: one full input snapshot tagged with a session-
/// monotonic id assigned by the [`Correlator`](crate::Correlator).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,
}

impl Request {
    pub fn new(id: u64, inputs: BTreeMap<String, String>) -> Self {
        Self { id, inputs }
    }

    /// The handshake frame sent immediately after the transport opens,
    /// before any caller-issued request. Serializes as `{}`.
    pub fn handshake() -> HandshakeFrame {
        HandshakeFrame {}
    }
}

/// Empty first frame after connect. Kept as its own type so a
/// handshake cannot be confused with a mutation of id 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeFrame {}

/// An evaluation result from the service.
///
/// `id` echoes (or exceeds) the request that produced it; an
/// unsolicited baseline frame may omit the id entirely, which
/// deserializes as 0 and is always accepted as the session baseline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn handshake_serializes_as_empty_object() {
        assert_eq!(serde_json::to_string(&Request::handshake()).unwrap(), "{}");
    }

    #[test]
    fn mutation_frame_shape() {
        let mut inputs = BTreeMap::new();
        inputs.insert("region".to_string(), "us".to_string());
        let req = Request::new(1, inputs);
        assert_eq!(
            serde_json::to_string(&req).unwrap(),
            r#"{"id":1,"inputs":{"region":"us"}}"#
        );
    }

    #[test]
    fn baseline_response_without_id_defaults_to_zero() {
        let resp: Response =
            serde_json::from_str(r#"{"diagnostics": [], "parameters": []}"#).unwrap();
        assert_eq!(resp.id, 0);
    }

    #[test]
    fn odd_parameter_type_does_not_sink_the_whole_frame() {
        // One parameter with an off-revision type spelling must not
        // make the full response unparseable.
        let json = r#"{
            "id": 1,
            "parameters": [
                {"name": "dry_run", "type": "boolean"},
                {"name": "shape", "type": "tuple"},
                {"name": "region", "type": "string"}
            ]
        }"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        assert_eq!(resp.parameters.len(), 3);
        assert_eq!(resp.parameters[0].param_type, crate::models::ParameterType::Bool);
        assert_eq!(
            resp.parameters[1].param_type,
            crate::models::ParameterType::Unknown
        );
    }

    #[test]
    fn response_roundtrip_with_diagnostics() {
        let json = r#"{
            "id": 3,
            "diagnostics": [
                {"severity": "error", "summary": "bad input", "detail": "value out of range"},
                {"severity": "warning", "summary": "deprecated field"}
            ],
            "parameters": []
        }"#;
        let resp: Response = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id, 3);
        assert_eq!(resp.diagnostics.len(), 2);
        assert_eq!(
            resp.diagnostics[0].detail.as_deref(),
            Some("value out of range")
        );
        assert_eq!(resp.diagnostics[1].detail, None);
    }
}
