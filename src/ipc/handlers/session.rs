use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{id_param, opt_id_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::session::{set_teacher_credentials, teacher_credentials, verify_teacher};
use serde_json::json;
use tracing::{info, warn};

fn handle_teacher_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let teacher_id = match str_param(&req.params, "teacherId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let pin = match str_param(&req.params, "pin") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    if !verify_teacher(repo.store(), &teacher_id, &pin) {
        warn!(teacher_id = %teacher_id, "teacher login rejected");
        return err(&req.id, "auth_failed", "invalid teacher id or pin", None);
    }
    state.session.set_teacher_logged_in(true);
    info!(teacher_id = %teacher_id, "teacher logged in");
    ok(&req.id, json!({ "status": state.session.status() }))
}

fn handle_teacher_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.logout_teacher();
    ok(&req.id, json!({ "status": state.session.status() }))
}

fn handle_student_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let student = match repo.student(student_id) {
        Ok(Some(s)) => s,
        Ok(None) => {
            warn!(student_id, "student login rejected: no such student");
            return err(&req.id, "not_found", "student not found", None);
        }
        Err(e) => return store_err(&req.id, &e),
    };
    state.session.set_student_logged_in(Some(student.id));
    ok(
        &req.id,
        json!({ "student": student, "status": state.session.status() }),
    )
}

fn handle_student_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session.logout_student();
    ok(&req.id, json!({ "status": state.session.status() }))
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "status": state.session.status() }))
}

fn handle_credentials_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let creds = teacher_credentials(repo.store());
    ok(&req.id, json!({ "teacherId": creds.id }))
}

fn handle_credentials_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    if !state.session.is_teacher_logged_in() {
        warn!("credential change rejected: no teacher session");
        return err(&req.id, "unauthorized", "teacher login required", None);
    }
    let teacher_id = match str_param(&req.params, "teacherId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let pin = match str_param(&req.params, "pin") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match set_teacher_credentials(repo.store(), &teacher_id, &pin) {
        Ok(()) => {
            info!(teacher_id = %teacher_id, "teacher credentials changed");
            ok(&req.id, json!({ "teacherId": teacher_id }))
        }
        Err(e) => store_err(&req.id, &e),
    }
}

/// `studentId: null` clears the teacher's detail view.
fn handle_view_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match opt_id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    if let Some(sid) = student_id {
        match repo.student(sid) {
            Ok(Some(_)) => {}
            Ok(None) => return err(&req.id, "not_found", "student not found", None),
            Err(e) => return store_err(&req.id, &e),
        }
    }
    state.session.set_viewed_student(student_id);
    ok(&req.id, json!({ "status": state.session.status() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.teacherLogin" => Some(handle_teacher_login(state, req)),
        "session.teacherLogout" => Some(handle_teacher_logout(state, req)),
        "session.studentLogin" => Some(handle_student_login(state, req)),
        "session.studentLogout" => Some(handle_student_logout(state, req)),
        "session.status" => Some(handle_status(state, req)),
        "session.credentials.get" => Some(handle_credentials_get(state, req)),
        "session.credentials.set" => Some(handle_credentials_set(state, req)),
        "session.viewStudent" => Some(handle_view_student(state, req)),
        _ => None,
    }
}
