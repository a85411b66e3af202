use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{id_param, opt_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    match repo.students() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.student(student_id) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let name = match str_param(&req.params, "name") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let email = opt_str_param(&req.params, "email");

    match repo.add_student(&name, email.as_deref()) {
        Ok(student) => ok(
            &req.id,
            json!({ "studentId": student.id, "student": student }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let removed = match repo.delete_student(student_id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    // Pointers at a deleted student must not survive it.
    if state.session.current_student_id() == Some(student_id) {
        state.session.logout_student();
    }
    if state.session.viewed_student_id() == Some(student_id) {
        state.session.set_viewed_student(None);
    }

    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
