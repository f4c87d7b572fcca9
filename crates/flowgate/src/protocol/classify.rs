//! Shape-based classification of decoded JSON into protocol messages.

use serde_json::Value;

use crate::types::{
    EngineError, EngineResult, JsonRpcError, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse,
};

/// Sort one decoded JSON value into a message variant.
///
/// A request carries both `id` and `method`; a notification carries `method`
/// without `id`; a response carries `id` without `method` plus `result` or
/// `error`. Values matching none of these shapes (or failing wire
/// deserialization, e.g. a missing `jsonrpc` field) yield `None` and are
/// dropped by callers before execution.
pub fn classify(value: &Value) -> Option<JsonRpcMessage> {
    let obj = value.as_object()?;
    let has_id = obj.contains_key("id");
    let has_method = obj.contains_key("method");

    if has_id && has_method {
        let req: JsonRpcRequest = serde_json::from_value(value.clone()).ok()?;
        return Some(JsonRpcMessage::Request(req));
    }
    if has_method {
        let notif: JsonRpcNotification = serde_json::from_value(value.clone()).ok()?;
        return Some(JsonRpcMessage::Notification(notif));
    }
    if has_id && obj.contains_key("result") {
        let resp: JsonRpcResponse = serde_json::from_value(value.clone()).ok()?;
        return Some(JsonRpcMessage::Response(resp));
    }
    if has_id && obj.contains_key("error") {
        let err: JsonRpcError = serde_json::from_value(value.clone()).ok()?;
        return Some(JsonRpcMessage::Error(err));
    }
    None
}

/// Classify one newline-delimited line of JSON.
pub fn classify_line(line: &str) -> Option<JsonRpcMessage> {
    let value: Value = serde_json::from_str(line).ok()?;
    classify(&value)
}

/// Classify a POST body: a single object or an array of objects.
///
/// Returns the surviving messages in their original order; anything that
/// does not classify is silently discarded.
pub fn classify_batch(body: &Value) -> Vec<JsonRpcMessage> {
    match body {
        Value::Array(items) => items.iter().filter_map(classify).collect(),
        other => classify(other).into_iter().collect(),
    }
}

/// Whether a classified batch contains at least one request.
///
/// Batches without requests are acknowledged without ever reaching the
/// engine.
pub fn batch_has_request(batch: &[JsonRpcMessage]) -> bool {
    batch
        .iter()
        .any(|msg| matches!(msg, JsonRpcMessage::Request(_)))
}

/// Serialize a message to the single-line form the engine boundary carries.
pub fn encode_line(msg: &JsonRpcMessage) -> EngineResult<String> {
    serde_json::to_string(msg).map_err(|e| EngineError::Internal(e.to_string()))
}
