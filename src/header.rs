//! JSON header carried as the body of a HEADER packet (spec §4.2).

use crate::error::ScampError;
use serde::{Deserialize, Serialize};

/// Body encoding tag. Unrecognized tokens fail decode rather than being
/// accepted loosely — the envelope is the one field spec §8 names an
/// explicit rejection test for (`envelope: "xml"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Envelope {
    Json,
    Jsonstore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Request,
    Reply,
}

/// Parsed form of a HEADER packet's JSON body.
///
/// `action`/`envelope`/`version` are request-only per spec §3, but none of
/// them are enforced as mandatory on decode: the worked example in spec §8
/// decodes a header with neither `type` nor `request_id` present, so the
/// only hard failure mode here is invalid JSON or an unrecognized
/// `envelope` token. See DESIGN.md for the reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub message_type: Option<MessageType>,
    pub request_id: String,
    pub action: Option<String>,
    pub envelope: Option<Envelope>,
    pub version: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(rename = "type")]
    message_type: Option<MessageType>,
    #[serde(default)]
    request_id: String,
    action: Option<String>,
    envelope: Option<Envelope>,
    version: Option<i64>,
}

#[derive(Serialize)]
struct WireHeader<'a> {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "str::is_empty")]
    request_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    envelope: Option<Envelope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<i64>,
}

impl PacketHeader {
    /// Decode the JSON body of a HEADER packet. Unknown fields are ignored
    /// (serde's default behavior); an invalid `envelope` token or malformed
    /// JSON is the only decode failure.
    pub fn decode(body: &[u8]) -> Result<Self, ScampError> {
        let raw: RawHeader =
            serde_json::from_slice(body).map_err(|e| ScampError::BadHeader(e.to_string()))?;
        Ok(PacketHeader {
            message_type: raw.message_type,
            request_id: raw.request_id,
            action: raw.action,
            envelope: raw.envelope,
            version: raw.version,
        })
    }

    /// Encode to compact JSON followed by a trailing newline — the codec's
    /// natural terminator, counted as part of the body length per spec
    /// §4.1.
    pub fn encode(&self) -> Vec<u8> {
        let wire = WireHeader {
            message_type: self.message_type,
            request_id: &self.request_id,
            action: self.action.as_deref(),
            envelope: self.envelope,
            version: self.version,
        };
        let mut json = serde_json::to_vec(&wire).expect("PacketHeader always serializes");
        json.push(b'\n');
        json
    }
}
