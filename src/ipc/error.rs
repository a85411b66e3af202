use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Storage failures: unreadable collection JSON is `store_corrupt`, anything else `store_failed`.
pub fn store_err(id: &str, e: &anyhow::Error) -> serde_json::Value {
    let code = if e.chain().any(|c| c.is::<serde_json::Error>()) {
        "store_corrupt"
    } else {
        "store_failed"
    };
    err(id, code, format!("{e:#}"), None)
}
