use crate::model::StudentId;
use crate::store::{MemoryStore, Store};
use serde::Serialize;
use tracing::warn;

const TEACHER_ID_KEY: &str = "teacherId";
const TEACHER_PIN_KEY: &str = "teacherPin";

const TEACHER_LOGGED_IN_KEY: &str = "teacherLoggedIn";
const STUDENT_LOGGED_IN_KEY: &str = "studentLoggedIn";
const CURRENT_STUDENT_ID_KEY: &str = "currentStudentId";
const VIEW_STUDENT_ID_KEY: &str = "viewStudentId";

pub const DEFAULT_TEACHER_ID: &str = "teacher";
pub const DEFAULT_TEACHER_PIN: &str = "5678";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherCredentials {
    pub id: String,
    pub pin: String,
}

impl Default for TeacherCredentials {
    fn default() -> Self {
        Self {
            id: DEFAULT_TEACHER_ID.to_string(),
            pin: DEFAULT_TEACHER_PIN.to_string(),
        }
    }
}

/// Stored credentials, falling back to the built-in pair for unset keys or a failing store.
pub fn teacher_credentials(store: &impl Store) -> TeacherCredentials {
    let read = || -> anyhow::Result<TeacherCredentials> {
        let id = store.get(TEACHER_ID_KEY)?.filter(|v| !v.is_empty());
        let pin = store.get(TEACHER_PIN_KEY)?.filter(|v| !v.is_empty());
        Ok(TeacherCredentials {
            id: id.unwrap_or_else(|| DEFAULT_TEACHER_ID.to_string()),
            pin: pin.unwrap_or_else(|| DEFAULT_TEACHER_PIN.to_string()),
        })
    };
    match read() {
        Ok(c) => c,
        Err(e) => {
            warn!("credential read failed, using defaults: {e:#}");
            TeacherCredentials::default()
        }
    }
}

pub fn set_teacher_credentials(store: &impl Store, id: &str, pin: &str) -> anyhow::Result<()> {
    store.set_many(&[
        (TEACHER_ID_KEY, id.to_string()),
        (TEACHER_PIN_KEY, pin.to_string()),
    ])
}

pub fn verify_teacher(store: &impl Store, id: &str, pin: &str) -> bool {
    let creds = teacher_credentials(store);
    creds.id == id && creds.pin == pin
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub teacher_logged_in: bool,
    pub student_logged_in: bool,
    pub current_student_id: Option<StudentId>,
    pub viewed_student_id: Option<StudentId>,
}

/// Session-scoped login state. Lives only as long as the process, like browser session storage.
#[derive(Debug, Default)]
pub struct Session {
    store: MemoryStore,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.store.get(key), Ok(Some(v)) if v == "true")
    }

    fn id(&self, key: &str) -> Option<StudentId> {
        self.store
            .get(key)
            .ok()
            .flatten()
            .and_then(|v| v.trim().parse().ok())
    }

    // MemoryStore cannot fail.
    fn put(&self, key: &str, value: &str) {
        let _ = self.store.set(key, value);
    }

    fn clear(&self, key: &str) {
        let _ = self.store.remove(key);
    }

    pub fn is_teacher_logged_in(&self) -> bool {
        self.flag(TEACHER_LOGGED_IN_KEY)
    }

    pub fn set_teacher_logged_in(&self, value: bool) {
        if value {
            self.put(TEACHER_LOGGED_IN_KEY, "true");
        } else {
            self.clear(TEACHER_LOGGED_IN_KEY);
        }
    }

    /// Both the flag and a current student id must be present.
    pub fn is_student_logged_in(&self) -> bool {
        self.flag(STUDENT_LOGGED_IN_KEY) && self.current_student_id().is_some()
    }

    pub fn set_student_logged_in(&self, student_id: Option<StudentId>) {
        match student_id {
            Some(id) => {
                self.put(STUDENT_LOGGED_IN_KEY, "true");
                self.put(CURRENT_STUDENT_ID_KEY, &id.to_string());
            }
            None => {
                self.clear(STUDENT_LOGGED_IN_KEY);
                self.clear(CURRENT_STUDENT_ID_KEY);
            }
        }
    }

    pub fn current_student_id(&self) -> Option<StudentId> {
        self.id(CURRENT_STUDENT_ID_KEY)
    }

    pub fn logout_teacher(&self) {
        self.set_teacher_logged_in(false);
        self.set_viewed_student(None);
    }

    pub fn logout_student(&self) {
        self.set_student_logged_in(None);
    }

    /// Student the teacher's detail view is showing.
    pub fn set_viewed_student(&self, student_id: Option<StudentId>) {
        match student_id {
            Some(id) => self.put(VIEW_STUDENT_ID_KEY, &id.to_string()),
            None => self.clear(VIEW_STUDENT_ID_KEY),
        }
    }

    pub fn viewed_student_id(&self) -> Option<StudentId> {
        self.id(VIEW_STUDENT_ID_KEY)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            teacher_logged_in: self.is_teacher_logged_in(),
            student_logged_in: self.is_student_logged_in(),
            current_student_id: self.current_student_id(),
            viewed_student_id: self.viewed_student_id(),
        }
    }
}
