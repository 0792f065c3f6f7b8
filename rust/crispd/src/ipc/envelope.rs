use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({ "id": id, "ok": true, "result": result })
}

/// Failure envelope. `id` is `None` only when the request line itself
/// could not be parsed.
pub fn err(
    id: Option<&str>,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut resp = json!({
        "ok": false,
        "error": { "code": code, "message": message.into() },
    });
    if let Some(id) = id {
        resp["id"] = json!(id);
    }
    if let Some(d) = details {
        resp["error"]["details"] = d;
    }
    resp
}

pub fn bad_json(e: &serde_json::Error) -> serde_json::Value {
    err(
        None,
        "bad_json",
        e.to_string(),
        Some(json!({ "line": e.line(), "column": e.column() })),
    )
}
