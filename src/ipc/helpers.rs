use crate::model::{Role, StudentId};
use serde_json::Value;

/// Ids arrive as JSON numbers or, from older pages, numeric strings.
fn as_id(v: &Value) -> Option<StudentId> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn id_param(params: &Value, key: &str) -> Result<i64, String> {
    match params.get(key) {
        None | Some(Value::Null) => Err(format!("missing {}", key)),
        Some(v) => as_id(v).ok_or_else(|| format!("{} must be an integer id", key)),
    }
}

pub fn opt_id_param(params: &Value, key: &str) -> Result<Option<i64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => as_id(v)
            .map(Some)
            .ok_or_else(|| format!("{} must be an integer id", key)),
    }
}

pub fn id_list_param(params: &Value, key: &str) -> Result<Vec<i64>, String> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| as_id(v).ok_or_else(|| format!("{} must contain integer ids", key)))
            .collect(),
        Some(_) => Err(format!("{} must be an array", key)),
    }
}

/// Required string, trimmed, must not be empty.
pub fn str_param(params: &Value, key: &str) -> Result<String, String> {
    let s = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))?;
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    Ok(s.to_string())
}

/// Optional string, trimmed; blank counts as absent.
pub fn opt_str_param(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn role_param(params: &Value, key: &str) -> Result<Role, String> {
    let raw = params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))?;
    Role::parse(raw).ok_or_else(|| format!("{} must be \"teacher\" or \"student\"", key))
}
