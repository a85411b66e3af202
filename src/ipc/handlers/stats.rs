use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::id_param;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_stats_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.student_stats(student_id) {
        Ok(stats) => ok(&req.id, json!({ "stats": stats })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_stats_overall(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match repo.overall_stats() {
        Ok(stats) => ok(&req.id, json!({ "stats": stats })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_stats_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "progress": [] }));
    };
    match repo.student_progress() {
        Ok(progress) => ok(&req.id, json!({ "progress": progress })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.student" => Some(handle_stats_student(state, req)),
        "stats.overall" => Some(handle_stats_overall(state, req)),
        "stats.progress" => Some(handle_stats_progress(state, req)),
        _ => None,
    }
}
