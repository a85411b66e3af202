use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::debug;

fn handle_events_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.events_enabled = true;
    if state.events.is_none() {
        state.events = state.repo.as_mut().map(|repo| repo.subscribe());
    }
    debug!(attached = state.events.is_some(), "change events enabled");
    ok(&req.id, json!({ "subscribed": true }))
}

fn handle_events_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.events_enabled = false;
    // Dropping the receiver disconnects it; the repository prunes it on the next publish.
    state.events = None;
    ok(&req.id, json!({ "subscribed": false }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "events.subscribe" => Some(handle_events_subscribe(state, req)),
        "events.unsubscribe" => Some(handle_events_unsubscribe(state, req)),
        _ => None,
    }
}
