use crate::model::{Student, StudentId, Task, TaskType};
use chrono::NaiveDate;
use serde::Serialize;

/// Deadlines this close (in days) or closer count as due soon.
const SOON_DAYS: i64 = 2;

/// Whole-number completion percentage, half rounded up; `0` when there is nothing to complete.
pub fn percentage(completed: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * completed as f64 / total as f64).round() as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub percentage: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_students: usize,
    pub total_tasks: usize,
    pub total_assignments: usize,
    pub completed_assignments: usize,
    pub pending_assignments: usize,
    pub overall_completion_percentage: u32,
    pub individual_task_count: usize,
    pub group_task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub student: Student,
    pub stats: StudentStats,
}

/// Counts only tasks whose roster contains the student.
pub fn student_stats(tasks: &[Task], student_id: StudentId) -> StudentStats {
    let mut total = 0;
    let mut completed = 0;
    for task in tasks.iter().filter(|t| t.is_assigned(student_id)) {
        total += 1;
        if task.is_completed_by(student_id) {
            completed += 1;
        }
    }
    StudentStats {
        total,
        completed,
        pending: total - completed,
        percentage: percentage(completed, total),
    }
}

/// Assignment totals count roster slots and completion entries, not distinct students.
pub fn overall_stats(students: &[Student], tasks: &[Task]) -> OverallStats {
    let total_assignments: usize = tasks.iter().map(|t| t.assigned_to.len()).sum();
    let completed_assignments: usize = tasks.iter().map(|t| t.completed_by.len()).sum();
    let individual_task_count = tasks
        .iter()
        .filter(|t| t.kind == TaskType::Individual)
        .count();
    let group_task_count = tasks.iter().filter(|t| t.kind == TaskType::Group).count();

    OverallStats {
        total_students: students.len(),
        total_tasks: tasks.len(),
        total_assignments,
        completed_assignments,
        // completed_by is not forced inside the roster, so this can dip below zero on bad data.
        pending_assignments: total_assignments.saturating_sub(completed_assignments),
        overall_completion_percentage: percentage(completed_assignments, total_assignments),
        individual_task_count,
        group_task_count,
    }
}

pub fn student_progress(students: &[Student], tasks: &[Task]) -> Vec<StudentProgress> {
    students
        .iter()
        .map(|s| StudentProgress {
            student: s.clone(),
            stats: student_stats(tasks, s.id),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlineStatus {
    Overdue,
    Soon,
    Normal,
}

/// Whole calendar days from `today` to `deadline`; negative once it has passed.
pub fn days_left(deadline: NaiveDate, today: NaiveDate) -> i64 {
    (deadline - today).num_days()
}

pub fn deadline_status(deadline: NaiveDate, today: NaiveDate) -> DeadlineStatus {
    match days_left(deadline, today) {
        d if d < 0 => DeadlineStatus::Overdue,
        d if d <= SOON_DAYS => DeadlineStatus::Soon,
        _ => DeadlineStatus::Normal,
    }
}

/// A task as one student sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTaskView {
    #[serde(flatten)]
    pub task: Task,
    pub completed: bool,
    pub days_left: Option<i64>,
    /// Completed tasks are never flagged, whatever their deadline.
    pub deadline_status: Option<DeadlineStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudentTaskBoard {
    pub pending: Vec<StudentTaskView>,
    pub completed: Vec<StudentTaskView>,
}

/// Splits the student's roster tasks into pending and completed, keeping collection order.
pub fn student_task_board(
    tasks: &[Task],
    student_id: StudentId,
    today: NaiveDate,
) -> StudentTaskBoard {
    let mut board = StudentTaskBoard::default();
    for task in tasks.iter().filter(|t| t.is_assigned(student_id)) {
        let completed = task.is_completed_by(student_id);
        let days = task.deadline.map(|d| days_left(d, today));
        let status = task.deadline.map(|d| {
            if completed {
                DeadlineStatus::Normal
            } else {
                deadline_status(d, today)
            }
        });
        let view = StudentTaskView {
            task: task.clone(),
            completed,
            days_left: days,
            deadline_status: status,
        };
        if completed {
            board.completed.push(view);
        } else {
            board.pending.push(view);
        }
    }
    board
}
