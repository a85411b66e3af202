mod backup;
mod config;
mod db;
mod ipc;
mod model;
mod repo;
mod session;
mod stats;
mod store;

use std::io::{self, BufRead, Write};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn write_line(stdout: &mut impl Write, value: &serde_json::Value) {
    let _ = writeln!(
        stdout,
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{\"ok\":false}".to_string())
    );
}

fn main() {
    let _ = dotenvy::dotenv();
    let config = config::Config::from_env();

    // stdout carries the protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| "taskboardd=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let startup_workspace = config.workspace.clone();
    let mut state = ipc::AppState::new(config);
    info!(version = env!("CARGO_PKG_VERSION"), "taskboardd starting");

    if let Some(path) = startup_workspace {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            error!(workspace = %path.display(), "startup workspace failed to open: {e:#}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // No id to answer to.
                write_line(
                    &mut stdout,
                    &serde_json::json!({
                        "ok": false,
                        "error": { "code": "bad_json", "message": e.to_string() }
                    }),
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        write_line(&mut stdout, &resp);
        for event in state.drain_events() {
            write_line(&mut stdout, &event);
        }
        let _ = stdout.flush();
    }
    info!("stdin closed, exiting");
}
