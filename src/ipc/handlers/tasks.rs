use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{id_list_param, id_param, opt_str_param, str_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{NewTask, TaskType};
use chrono::NaiveDate;
use serde_json::json;
use tracing::warn;

fn handle_tasks_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "tasks": [] }));
    };
    match repo.tasks() {
        Ok(tasks) => ok(&req.id, json!({ "tasks": tasks })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_tasks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let task_id = match id_param(&req.params, "taskId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.task(task_id) {
        Ok(task) => ok(&req.id, json!({ "task": task })),
        Err(e) => store_err(&req.id, &e),
    }
}

/// Roster tasks plus the student's view of them: pending and completed, with deadline flags.
fn handle_tasks_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return ok(&req.id, json!({ "tasks": [], "pending": [], "completed": [] }));
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let tasks = match repo.tasks_for_student(student_id) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };
    match repo.student_task_board(student_id) {
        Ok(board) => ok(
            &req.id,
            json!({
                "tasks": tasks,
                "pending": board.pending,
                "completed": board.completed,
            }),
        ),
        Err(e) => store_err(&req.id, &e),
    }
}

fn parse_new_task(req: &Request) -> Result<NewTask, String> {
    let title = str_param(&req.params, "title")?;
    let description = opt_str_param(&req.params, "description");
    let type_raw = str_param(&req.params, "type")?;
    let kind = TaskType::parse(&type_raw)
        .ok_or_else(|| "type must be \"individual\" or \"group\"".to_string())?;
    let assigned_to = id_list_param(&req.params, "assignedTo")?;
    let deadline = match opt_str_param(&req.params, "deadline") {
        Some(raw) => Some(
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| "deadline must be YYYY-MM-DD".to_string())?,
        ),
        None => None,
    };
    Ok(NewTask {
        title,
        description,
        kind,
        assigned_to,
        deadline,
    })
}

fn handle_tasks_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let mut new_task = match parse_new_task(req) {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let students = match repo.students() {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &e),
    };

    // Group tasks go to the whole class unless a roster is given.
    if new_task.assigned_to.is_empty() && new_task.kind == TaskType::Group {
        new_task.assigned_to = students.iter().map(|s| s.id).collect();
    }
    if new_task.assigned_to.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "assignedTo must name at least one student",
            None,
        );
    }
    let unknown: Vec<i64> = new_task
        .assigned_to
        .iter()
        .copied()
        .filter(|sid| !students.iter().any(|s| s.id == *sid))
        .collect();
    if !unknown.is_empty() {
        warn!(?unknown, "task create rejected: unknown students");
        return err(
            &req.id,
            "bad_params",
            "assignedTo contains unknown students",
            Some(json!({ "unknownStudentIds": unknown })),
        );
    }

    match repo.create_task(new_task) {
        Ok(task) => ok(&req.id, json!({ "taskId": task.id, "task": task })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_tasks_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let task_id = match id_param(&req.params, "taskId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.delete_task(task_id) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_tasks_toggle_completion(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let task_id = match id_param(&req.params, "taskId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };

    let task = match repo.task(task_id) {
        Ok(Some(t)) => t,
        Ok(None) => return err(&req.id, "not_found", "task not found", None),
        Err(e) => return store_err(&req.id, &e),
    };
    // A stray completion outside the roster can still be cleared.
    if !task.is_assigned(student_id) && !task.is_completed_by(student_id) {
        warn!(task_id, student_id, "toggle rejected: student not on roster");
        return err(
            &req.id,
            "not_assigned",
            "student is not assigned to this task",
            Some(json!({ "taskId": task_id, "studentId": student_id })),
        );
    }

    match repo.toggle_completion(task_id, student_id) {
        Ok(Some(task)) => {
            let completed = task.is_completed_by(student_id);
            ok(&req.id, json!({ "task": task, "completed": completed }))
        }
        Ok(None) => err(&req.id, "not_found", "task not found", None),
        Err(e) => store_err(&req.id, &e),
    }
}

fn handle_tasks_is_completed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(repo) = state.repo.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let task_id = match id_param(&req.params, "taskId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    let student_id = match id_param(&req.params, "studentId") {
        Ok(v) => v,
        Err(m) => return err(&req.id, "bad_params", m, None),
    };
    match repo.is_completed_by(task_id, student_id) {
        Ok(completed) => ok(&req.id, json!({ "completed": completed })),
        Err(e) => store_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tasks.list" => Some(handle_tasks_list(state, req)),
        "tasks.get" => Some(handle_tasks_get(state, req)),
        "tasks.listForStudent" => Some(handle_tasks_list_for_student(state, req)),
        "tasks.create" => Some(handle_tasks_create(state, req)),
        "tasks.delete" => Some(handle_tasks_delete(state, req)),
        "tasks.toggleCompletion" => Some(handle_tasks_toggle_completion(state, req)),
        "tasks.isCompleted" => Some(handle_tasks_is_completed(state, req)),
        _ => None,
    }
}
