use serde_json::Value;

/// Unwrap a queue message body into a JSON payload object.
///
/// Three shapes are supported:
/// 1. The body is a JSON object: used directly.
/// 2. The body is a JSON object with a string `"Message"` field whose content
///    is itself a JSON object (SNS-over-SQS relay): the inner object wins.
/// 3. Anything else: wrapped as `{"raw": <body>}` so the decoder can report
///    it as an invalid payload instead of the transport dropping it.
pub fn unwrap_body(body: &str) -> Value {
    if let Ok(Value::Object(outer)) = serde_json::from_str::<Value>(body) {
        if let Some(Value::String(inner)) = outer.get("Message") {
            if let Ok(Value::Object(payload)) = serde_json::from_str::<Value>(inner) {
                return Value::Object(payload);
            }
        }
        return Value::Object(outer);
    }
    serde_json::json!({ "raw": body })
}
