use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{id_param, opt_id_param, role_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::Role;
use serde_json::json;

fn handle_messages_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "messages": [] }));
    };
    match repo.messages() {
        Ok(messages) => ok(&req.id, json!({ "messages": messages })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_thread(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.thread(student_id) {
        Ok(messages) => ok(&req.id, json!({ "messages": messages })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let body = match str_param(&req.params, "message") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let sender = match role_param(&req.params, "sender") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    match repo.student(student_id) {
        Ok(Some(_)) => {}
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return store_err(&req.id, &e),
    }

    match repo.send_message(student_id, &body, sender) {
        Ok(message) => ok(
            &req.id,
            json!({ "messageId": message.id, "message": message }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_mark_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let reader = match role_param(&req.params, "reader") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.mark_read(student_id, reader) {
        Ok(marked) => ok(&req.id, json!({ "marked": marked })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_unread_count(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let role = match role_param(&req.params, "role") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.unread_count(student_id, role) {
        Ok(count) => ok(&req.id, json!({ "count": count })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_last(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.last_message(student_id) {
        Ok(message) => ok(&req.id, json!({ "message": message })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_messages_threads(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "threads": [] }));
    };
    match repo.thread_summaries() {
        Ok(threads) => ok(&req.id, json!({ "threads": threads })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Badge count. A student-role query without an explicit studentId uses the logged-in student.
fn handle_messages_unread_total(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "count": 0 }));
    };
    let role = match role_param(&req.params, "role") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let student_id = match opt_id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let student_id = match (role, student_id) {
        (Role::Student, None) => state.session.current_student_id(),
        (_, sid) => sid,
    };
    match repo.unread_total(role, student_id) {
        Ok(count) => ok(&req.id, json!({ "count": count })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "messages.list" => Some(handle_messages_list(state, req)),
        "messages.thread" => Some(handle_messages_thread(state, req)),
        "messages.send" => Some(handle_messages_send(state, req)),
        "messages.markRead" => Some(handle_messages_mark_read(state, req)),
        "messages.unreadCount" => Some(handle_messages_unread_count(state, req)),
        "messages.last" => Some(handle_messages_last(state, req)),
        "messages.threads" => Some(handle_messages_threads(state, req)),
        "messages.unreadTotal" => Some(handle_messages_unread_total(state, req)),
        _ => None,
    }
}
