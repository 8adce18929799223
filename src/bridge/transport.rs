//! Host Transport
//!
//! The host boundary is string-only. Outbound, every flushed batch becomes a
//! single JSON envelope handed to one host script call. Inbound, the host
//! delivers either a batch `[[id, result], ...]` or a single `(id, result)`
//! pair; both are parsed here and nothing past this module sees raw strings.

use crate::bridge::protocol::{OutboundEnvelope, OutboundRequest};
use crate::core::error::{BridgeError, BridgeResult};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde_json::Value;

/// One-way script invocation primitive exposed by the host
///
/// The call is fire-and-forget: results arrive later through
/// [`crate::bridge::Bridge::receive`]. An `Err` means the host primitive
/// itself is missing or refused the call.
pub trait Host: Send + Sync {
    fn perform_script(&self, script: &str, parameter: &str) -> Result<(), String>;
}

impl<F> Host for F
where
    F: Fn(&str, &str) -> Result<(), String> + Send + Sync,
{
    fn perform_script(&self, script: &str, parameter: &str) -> Result<(), String> {
        self(script, parameter)
    }
}

/// A script call captured by [`ChannelHost`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCall {
    pub script: String,
    pub parameter: String,
}

impl HostCall {
    /// Decode the parameter as an outbound envelope
    pub fn envelope(&self) -> BridgeResult<OutboundEnvelope> {
        Ok(serde_json::from_str(&self.parameter)?)
    }
}

/// Host adapter that forwards every call over a channel
///
/// The receiving side is owned by whatever thread drives the real webview.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: Sender<HostCall>,
}

impl ChannelHost {
    pub fn new() -> (Self, Receiver<HostCall>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl Host for ChannelHost {
    fn perform_script(&self, script: &str, parameter: &str) -> Result<(), String> {
        self.tx
            .send(HostCall {
                script: script.to_string(),
                parameter: parameter.to_string(),
            })
            .map_err(|_| "host channel closed".to_string())
    }
}

/// Encode a batch into the string parameter for the responder script
pub fn encode_envelope(token: &str, requests: Vec<OutboundRequest>) -> BridgeResult<String> {
    let envelope = OutboundEnvelope {
        token: token.to_string(),
        requests,
    };
    serde_json::to_string(&envelope).map_err(|e| BridgeError::Transport(e.to_string()))
}

/// Parse a batch delivery
///
/// A payload that is not a JSON array is an error. Inside the array,
/// elements that are not `[id, result]` pairs are logged and skipped so the
/// valid ones still reach their requests.
pub fn parse_batch(raw: &str) -> BridgeResult<Vec<(String, Value)>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BridgeError::Protocol(format!("inbound batch is not JSON: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(BridgeError::Protocol(
            "inbound batch is not an array".to_string(),
        ));
    };

    let total = items.len();
    let entries: Vec<(String, Value)> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            let entry = parse_pair(item);
            if entry.is_none() {
                tracing::warn!(
                    target: "bridge.transport",
                    "Skipping malformed batch element {} of {}",
                    index,
                    total
                );
            }
            entry
        })
        .collect();
    Ok(entries)
}

fn parse_pair(item: Value) -> Option<(String, Value)> {
    let Value::Array(mut pair) = item else {
        return None;
    };
    if pair.len() < 2 {
        return None;
    }
    let result = pair.swap_remove(1);
    match pair.swap_remove(0) {
        Value::String(id) => Some((id, result)),
        _ => None,
    }
}

/// Parse a single `(id, result)` delivery
///
/// An empty result string is treated as `null`.
pub fn parse_single(id: &str, raw: &str) -> BridgeResult<(String, Value)> {
    if raw.trim().is_empty() {
        return Ok((id.to_string(), Value::Null));
    }
    let result = serde_json::from_str(raw)
        .map_err(|e| BridgeError::Protocol(format!("inbound result for {} is not JSON: {}", id, e)))?;
    Ok((id.to_string(), result))
}
