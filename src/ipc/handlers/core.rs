use crate::db::{self, SqliteStore};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::repo::{InitReport, Repository};
use crate::session::Session;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

/// Opens (or creates) the workspace store and makes it current. The session is reset:
/// logins belong to the workspace they were made against.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<InitReport> {
    let conn = db::open_db(path)?;
    let mut repo = Repository::new(SqliteStore::new(conn));
    let report = repo.initialize(state.config.seed_sample_data)?;

    state.events = if state.events_enabled {
        Some(repo.subscribe())
    } else {
        None
    };
    state.workspace = Some(path.to_path_buf());
    state.repo = Some(repo);
    state.session = Session::new();

    info!(
        workspace = %path.display(),
        created_keys = report.created_keys,
        seeded = report.seeded,
        "workspace opened"
    );
    Ok(report)
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(report) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "seeded": report.seeded
            }),
        ),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
