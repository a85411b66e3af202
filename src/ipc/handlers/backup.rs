use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn path_param(req: &Request, key: &str) -> Option<PathBuf> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(out_path) = path_param(req, "outPath") else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    match backup::export_bundle(repo, &out_path) {
        Ok(summary) => {
            info!(
                path = %out_path.display(),
                students = summary.students,
                tasks = summary.tasks,
                messages = summary.messages,
                "workspace bundle exported"
            );
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "bundleFormat": summary.bundle_format,
                    "entryCount": summary.entry_count,
                    "students": summary.students,
                    "tasks": summary.tasks,
                    "messages": summary.messages,
                }),
            )
        }
        Err(e) => err(
            &req.id,
            "bundle_failed",
            format!("{e:#}"),
            Some(json!({ "outPath": out_path.to_string_lossy() })),
        ),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(in_path) = path_param(req, "inPath") else {
        return err(&req.id, "bad_params", "missing inPath", None);
    };

    match backup::import_bundle(repo, &in_path) {
        Ok(summary) => {
            info!(
                path = %in_path.display(),
                students = summary.students,
                tasks = summary.tasks,
                messages = summary.messages,
                "workspace bundle imported"
            );
            // Session pointers may name students the bundle did not carry.
            let ids: Vec<i64> = match repo.students() {
                Ok(students) => students.iter().map(|s| s.id).collect(),
                Err(_) => Vec::new(),
            };
            if let Some(sid) = state.session.current_student_id() {
                if !ids.contains(&sid) {
                    state.session.logout_student();
                }
            }
            if let Some(sid) = state.session.viewed_student_id() {
                if !ids.contains(&sid) {
                    state.session.set_viewed_student(None);
                }
            }
            ok(
                &req.id,
                json!({
                    "bundleFormatDetected": summary.bundle_format_detected,
                    "students": summary.students,
                    "tasks": summary.tasks,
                    "messages": summary.messages,
                }),
            )
        }
        Err(e) => err(
            &req.id,
            "bundle_failed",
            format!("{e:#}"),
            Some(json!({ "inPath": in_path.to_string_lossy() })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workspace.exportBundle" => Some(handle_export_bundle(state, req)),
        "workspace.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
