use std::path::PathBuf;

use crate::config::Config;
use crate::db::SqliteStore;
use crate::repo::{Change, Repository};
use crate::session::Session;
use crossbeam_channel::Receiver;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub repo: Option<Repository<SqliteStore>>,
    pub session: Session,
    /// Set by `events.subscribe`; survives workspace switches.
    pub events_enabled: bool,
    pub events: Option<Receiver<Change>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            repo: None,
            session: Session::new(),
            events_enabled: false,
            events: None,
        }
    }

    /// Change notifications produced since the last drain, as protocol event lines.
    pub fn drain_events(&mut self) -> Vec<serde_json::Value> {
        let Some(rx) = self.events.as_ref() else {
            return Vec::new();
        };
        rx.try_iter()
            .map(|c| {
                serde_json::json!({
                    "event": "changed",
                    "collection": c.collection,
                    "studentId": c.student_id,
                })
            })
            .collect()
    }
}
