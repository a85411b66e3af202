use crate::model::{
    Message, NewTask, Role, Student, StudentId, Task, TaskId, TaskType,
};
use crate::stats::{self, OverallStats, StudentProgress, StudentStats, StudentTaskBoard};
use crate::store::Store;
use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Students,
    Tasks,
    Messages,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Self::Students, Self::Tasks, Self::Messages];

    pub fn key(self) -> &'static str {
        match self {
            Self::Students => "students",
            Self::Tasks => "tasks",
            Self::Messages => "messages",
        }
    }

    fn id_seq_key(self) -> &'static str {
        match self {
            Self::Students => "idSeq.students",
            Self::Tasks => "idSeq.tasks",
            Self::Messages => "idSeq.messages",
        }
    }
}

/// Published after every successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub collection: Collection,
    pub student_id: Option<StudentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub student: Student,
    pub last_message: Option<Message>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created_keys: usize,
    pub seeded: bool,
}

type Clock = Box<dyn Fn() -> DateTime<Utc>>;

/// Sole owner of the students/tasks/messages collections.
///
/// Every mutator reads the whole collection, applies its change and writes the whole
/// collection back; there is no caching between calls.
pub struct Repository<S: Store> {
    store: S,
    clock: Clock,
    subscribers: Vec<Sender<Change>>,
}

impl<S: Store> Repository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            clock: Box::new(Utc::now),
            subscribers: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_clock(store: S, clock: impl Fn() -> DateTime<Utc> + 'static) -> Self {
        Self {
            store,
            clock: Box::new(clock),
            subscribers: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates missing collection keys, then seeds the sample class when `seed` is set
    /// and the workspace has never held any records.
    pub fn initialize(&mut self, seed: bool) -> anyhow::Result<InitReport> {
        let mut report = InitReport::default();
        for c in Collection::ALL {
            if self.store.get(c.key())?.is_none() {
                self.store.set(c.key(), "[]")?;
                report.created_keys += 1;
            }
        }

        if seed && self.is_pristine()? {
            self.write_sample_data()?;
            report.seeded = true;
            info!("seeded sample students and tasks");
        }
        Ok(report)
    }

    /// No records and no id ever issued. Sample ids start at 1, so seeding anything
    /// else could hand out an id that was already used and deleted.
    fn is_pristine(&self) -> anyhow::Result<bool> {
        if !self.students()?.is_empty() {
            return Ok(false);
        }
        for c in Collection::ALL {
            if self.store.get(c.id_seq_key())?.is_some() {
                return Ok(false);
            }
        }
        Ok(self.tasks()?.is_empty() && self.messages()?.is_empty())
    }

    pub fn subscribe(&mut self) -> Receiver<Change> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn publish(&mut self, collection: Collection, student_id: Option<StudentId>) {
        let change = Change {
            collection,
            student_id,
        };
        self.subscribers.retain(|tx| tx.send(change).is_ok());
    }

    fn load<T: DeserializeOwned>(&self, c: Collection) -> anyhow::Result<Vec<T>> {
        let Some(raw) = self.store.get(c.key())? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() || raw.trim() == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).with_context(|| format!("collection {} is corrupt", c.key()))
    }

    fn encode<T: Serialize>(c: Collection, rows: &[T]) -> anyhow::Result<String> {
        serde_json::to_string(rows).with_context(|| format!("failed to encode {}", c.key()))
    }

    fn save<T: Serialize>(&self, c: Collection, rows: &[T]) -> anyhow::Result<()> {
        self.store.set(c.key(), &Self::encode(c, rows)?)
    }

    /// Saves `rows` together with the id high-water mark for `c`.
    fn save_with_id<T: Serialize>(&self, c: Collection, rows: &[T], id: i64) -> anyhow::Result<()> {
        self.store.set_many(&[
            (c.key(), Self::encode(c, rows)?),
            (c.id_seq_key(), id.to_string()),
        ])
    }

    fn high_water(&self, c: Collection) -> anyhow::Result<i64> {
        Ok(self
            .store
            .get(c.id_seq_key())?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0))
    }

    /// Next id for `c`: the clock in milliseconds, bumped past every id ever issued.
    fn allocate_id(&self, c: Collection, existing: impl Iterator<Item = i64>) -> anyhow::Result<i64> {
        let floor = existing.fold(self.high_water(c)?, i64::max);
        let now_ms = (self.clock)().timestamp_millis();
        Ok(now_ms.max(floor + 1))
    }

    // -- Students --

    pub fn students(&self) -> anyhow::Result<Vec<Student>> {
        self.load(Collection::Students)
    }

    pub fn student(&self, id: StudentId) -> anyhow::Result<Option<Student>> {
        Ok(self.students()?.into_iter().find(|s| s.id == id))
    }

    pub fn add_student(&mut self, name: &str, email: Option<&str>) -> anyhow::Result<Student> {
        let mut students = self.students()?;
        let id = self.allocate_id(Collection::Students, students.iter().map(|s| s.id))?;
        let student = Student {
            id,
            name: name.to_string(),
            email: email.map(str::to_string),
        };
        students.push(student.clone());
        self.save_with_id(Collection::Students, &students, id)?;
        debug!(student_id = id, "student added");
        self.publish(Collection::Students, Some(id));
        Ok(student)
    }

    /// Removes the student and strips the id from every task roster and completion set.
    /// Messages in the student's thread are kept. Returns whether a student was removed.
    pub fn delete_student(&mut self, id: StudentId) -> anyhow::Result<bool> {
        let mut students = self.students()?;
        let before = students.len();
        students.retain(|s| s.id != id);
        let removed = students.len() != before;

        let mut tasks = self.tasks()?;
        let mut tasks_changed = false;
        for task in tasks.iter_mut() {
            let (a, c) = (task.assigned_to.len(), task.completed_by.len());
            task.assigned_to.retain(|sid| *sid != id);
            task.completed_by.retain(|sid| *sid != id);
            tasks_changed |= a != task.assigned_to.len() || c != task.completed_by.len();
        }

        if !removed && !tasks_changed {
            return Ok(false);
        }

        self.store.set_many(&[
            (
                Collection::Students.key(),
                Self::encode(Collection::Students, &students)?,
            ),
            (
                Collection::Tasks.key(),
                Self::encode(Collection::Tasks, &tasks)?,
            ),
        ])?;
        debug!(student_id = id, removed, tasks_changed, "student deleted");
        if removed {
            self.publish(Collection::Students, Some(id));
        }
        if tasks_changed {
            self.publish(Collection::Tasks, Some(id));
        }
        Ok(removed)
    }

    // -- Tasks --

    pub fn tasks(&self) -> anyhow::Result<Vec<Task>> {
        self.load(Collection::Tasks)
    }

    pub fn task(&self, id: TaskId) -> anyhow::Result<Option<Task>> {
        Ok(self.tasks()?.into_iter().find(|t| t.id == id))
    }

    pub fn tasks_for_student(&self, student_id: StudentId) -> anyhow::Result<Vec<Task>> {
        Ok(self
            .tasks()?
            .into_iter()
            .filter(|t| t.is_assigned(student_id))
            .collect())
    }

    pub fn create_task(&mut self, new: NewTask) -> anyhow::Result<Task> {
        let mut tasks = self.tasks()?;
        let id = self.allocate_id(Collection::Tasks, tasks.iter().map(|t| t.id))?;
        let mut assigned_to = Vec::with_capacity(new.assigned_to.len());
        for sid in new.assigned_to {
            if !assigned_to.contains(&sid) {
                assigned_to.push(sid);
            }
        }
        let task = Task {
            id,
            title: new.title,
            description: new.description,
            kind: new.kind,
            assigned_to,
            completed_by: Vec::new(),
            deadline: new.deadline,
            created_at: (self.clock)(),
        };
        tasks.push(task.clone());
        self.save_with_id(Collection::Tasks, &tasks, id)?;
        debug!(task_id = id, roster = task.assigned_to.len(), "task created");
        self.publish(Collection::Tasks, None);
        Ok(task)
    }

    pub fn delete_task(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let mut tasks = self.tasks()?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save(Collection::Tasks, &tasks)?;
        self.publish(Collection::Tasks, None);
        Ok(true)
    }

    /// Flips the student's completion mark. Roster membership is not checked here;
    /// callers that care (the IPC layer does) must check `Task::is_assigned` first.
    pub fn toggle_completion(
        &mut self,
        task_id: TaskId,
        student_id: StudentId,
    ) -> anyhow::Result<Option<Task>> {
        let mut tasks = self.tasks()?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            return Ok(None);
        };
        if let Some(pos) = task.completed_by.iter().position(|sid| *sid == student_id) {
            task.completed_by.remove(pos);
        } else {
            task.completed_by.push(student_id);
        }
        let updated = task.clone();
        self.save(Collection::Tasks, &tasks)?;
        self.publish(Collection::Tasks, Some(student_id));
        Ok(Some(updated))
    }

    pub fn is_completed_by(&self, task_id: TaskId, student_id: StudentId) -> anyhow::Result<bool> {
        Ok(self
            .task(task_id)?
            .map(|t| t.is_completed_by(student_id))
            .unwrap_or(false))
    }

    // -- Statistics --

    pub fn student_stats(&self, student_id: StudentId) -> anyhow::Result<StudentStats> {
        Ok(stats::student_stats(&self.tasks()?, student_id))
    }

    pub fn overall_stats(&self) -> anyhow::Result<OverallStats> {
        Ok(stats::overall_stats(&self.students()?, &self.tasks()?))
    }

    pub fn student_progress(&self) -> anyhow::Result<Vec<StudentProgress>> {
        Ok(stats::student_progress(&self.students()?, &self.tasks()?))
    }

    /// The student's tasks split by completion, with deadlines measured against today's
    /// date on the repository clock.
    pub fn student_task_board(&self, student_id: StudentId) -> anyhow::Result<StudentTaskBoard> {
        let today = (self.clock)().date_naive();
        Ok(stats::student_task_board(&self.tasks()?, student_id, today))
    }

    // -- Messages --

    pub fn messages(&self) -> anyhow::Result<Vec<Message>> {
        self.load(Collection::Messages)
    }

    /// The student's thread, oldest first. Equal timestamps keep insertion order.
    pub fn thread(&self, student_id: StudentId) -> anyhow::Result<Vec<Message>> {
        let mut thread: Vec<Message> = self
            .messages()?
            .into_iter()
            .filter(|m| m.student_id == student_id)
            .collect();
        thread.sort_by_key(|m| m.timestamp);
        Ok(thread)
    }

    pub fn send_message(
        &mut self,
        student_id: StudentId,
        body: &str,
        sender: Role,
    ) -> anyhow::Result<Message> {
        let mut messages = self.messages()?;
        let id = self.allocate_id(Collection::Messages, messages.iter().map(|m| m.id))?;
        let message = Message {
            id,
            student_id,
            message: body.to_string(),
            sender,
            timestamp: (self.clock)(),
            read: false,
        };
        messages.push(message.clone());
        self.save_with_id(Collection::Messages, &messages, id)?;
        self.publish(Collection::Messages, Some(student_id));
        Ok(message)
    }

    /// `reader` has seen the thread: everything the other party sent becomes read.
    /// Returns how many messages flipped from unread to read.
    pub fn mark_read(&mut self, student_id: StudentId, reader: Role) -> anyhow::Result<usize> {
        let mut messages = self.messages()?;
        let author = reader.other();
        let mut flipped = 0;
        for m in messages
            .iter_mut()
            .filter(|m| m.student_id == student_id && m.sender == author)
        {
            if !m.read {
                flipped += 1;
            }
            m.read = true;
        }
        self.save(Collection::Messages, &messages)?;
        if flipped > 0 {
            self.publish(Collection::Messages, Some(student_id));
        }
        Ok(flipped)
    }

    /// Unread messages in the thread that `role` did not author.
    pub fn unread_count(&self, student_id: StudentId, role: Role) -> anyhow::Result<usize> {
        Ok(self
            .messages()?
            .iter()
            .filter(|m| m.student_id == student_id && m.sender != role && !m.read)
            .count())
    }

    /// Badge total for `role`: a student sees their own thread, the teacher sees every
    /// current student's thread.
    pub fn unread_total(&self, role: Role, student_id: Option<StudentId>) -> anyhow::Result<usize> {
        match (role, student_id) {
            (Role::Student, Some(sid)) => self.unread_count(sid, Role::Student),
            (Role::Student, None) => Ok(0),
            (Role::Teacher, _) => {
                let messages = self.messages()?;
                Ok(self
                    .students()?
                    .iter()
                    .map(|s| {
                        messages
                            .iter()
                            .filter(|m| {
                                m.student_id == s.id && m.sender != Role::Teacher && !m.read
                            })
                            .count()
                    })
                    .sum())
            }
        }
    }

    pub fn last_message(&self, student_id: StudentId) -> anyhow::Result<Option<Message>> {
        Ok(self.thread(student_id)?.pop())
    }

    /// One entry per current student, most recent conversation first; students with an
    /// empty thread go last in collection order.
    pub fn thread_summaries(&self) -> anyhow::Result<Vec<ThreadSummary>> {
        let mut summaries = Vec::new();
        for student in self.students()? {
            let last_message = self.last_message(student.id)?;
            let unread_count = self.unread_count(student.id, Role::Teacher)?;
            summaries.push(ThreadSummary {
                student,
                last_message,
                unread_count,
            });
        }
        summaries.sort_by(|a, b| match (&a.last_message, &b.last_message) {
            (Some(x), Some(y)) => y.timestamp.cmp(&x.timestamp),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(summaries)
    }

    // -- Bulk --

    /// Replaces all three collections at once (bundle import). Id high-water marks only
    /// move forward so ids issued before the import are never handed out again.
    pub fn replace_all(
        &mut self,
        students: &[Student],
        tasks: &[Task],
        messages: &[Message],
    ) -> anyhow::Result<()> {
        let mut entries = vec![
            (
                Collection::Students.key(),
                Self::encode(Collection::Students, students)?,
            ),
            (Collection::Tasks.key(), Self::encode(Collection::Tasks, tasks)?),
            (
                Collection::Messages.key(),
                Self::encode(Collection::Messages, messages)?,
            ),
        ];
        let imported_max = [
            (Collection::Students, students.iter().map(|s| s.id).max()),
            (Collection::Tasks, tasks.iter().map(|t| t.id).max()),
            (Collection::Messages, messages.iter().map(|m| m.id).max()),
        ];
        for (c, max) in imported_max {
            let seq = self.high_water(c)?.max(max.unwrap_or(0));
            entries.push((c.id_seq_key(), seq.to_string()));
        }
        self.store.set_many(&entries)?;
        for c in Collection::ALL {
            self.publish(c, None);
        }
        Ok(())
    }

    fn write_sample_data(&mut self) -> anyhow::Result<()> {
        let students: Vec<Student> = [
            (1, "Ahmed Ali", "ahmed@example.com"),
            (2, "Fatima Hassan", "fatima@example.com"),
            (3, "Omar Ibrahim", "omar@example.com"),
            (4, "Aisha Mohammed", "aisha@example.com"),
            (5, "Yusuf Abdullah", "yusuf@example.com"),
        ]
        .into_iter()
        .map(|(id, name, email)| Student {
            id,
            name: name.to_string(),
            email: Some(email.to_string()),
        })
        .collect();

        let now = (self.clock)();
        let sample = |id: i64,
                      title: &str,
                      description: &str,
                      kind: TaskType,
                      assigned_to: &[i64],
                      deadline: (i32, u32, u32),
                      completed_by: &[i64]| Task {
            id,
            title: title.to_string(),
            description: Some(description.to_string()),
            kind,
            assigned_to: assigned_to.to_vec(),
            completed_by: completed_by.to_vec(),
            deadline: NaiveDate::from_ymd_opt(deadline.0, deadline.1, deadline.2),
            created_at: now,
        };
        let tasks = vec![
            sample(
                1,
                "Complete Mathematics Assignment",
                "Solve problems 1-20 from Chapter 5",
                TaskType::Individual,
                &[1, 2, 3, 4, 5],
                (2025, 10, 15),
                &[1],
            ),
            sample(
                2,
                "Science Project Report",
                "Write a detailed report on your science experiment",
                TaskType::Individual,
                &[1, 2, 3, 4, 5],
                (2025, 10, 20),
                &[1, 2],
            ),
            sample(
                3,
                "Group Presentation on Climate Change",
                "Prepare a 15-minute presentation with your group",
                TaskType::Group,
                &[1, 2, 3],
                (2025, 10, 25),
                &[1],
            ),
            sample(
                4,
                "English Essay Writing",
                "Write a 500-word essay on your favorite book",
                TaskType::Individual,
                &[4, 5],
                (2025, 10, 18),
                &[],
            ),
        ];

        self.store.set_many(&[
            (
                Collection::Students.key(),
                Self::encode(Collection::Students, &students)?,
            ),
            (Collection::Tasks.key(), Self::encode(Collection::Tasks, &tasks)?),
            (Collection::Students.id_seq_key(), students.len().to_string()),
            (Collection::Tasks.id_seq_key(), tasks.len().to_string()),
        ])?;
        self.publish(Collection::Students, None);
        self.publish(Collection::Tasks, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Clock that advances one second per reading, starting at a fixed instant.
    fn ticking_repo() -> Repository<MemoryStore> {
        let tick = Rc::new(Cell::new(0i64));
        let base: DateTime<Utc> = "2025-10-01T08:00:00Z".parse().expect("base ts");
        Repository::with_clock(MemoryStore::new(), move || {
            let n = tick.get();
            tick.set(n + 1);
            base + chrono::Duration::seconds(n)
        })
    }

    fn individual(title: &str, assigned_to: Vec<i64>) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            kind: TaskType::Individual,
            assigned_to,
            deadline: None,
        }
    }

    #[test]
    fn initialize_creates_keys_and_seeds_once() {
        let mut repo = ticking_repo();
        let report = repo.initialize(true).expect("init");
        assert_eq!(report.created_keys, 3);
        assert!(report.seeded);
        assert_eq!(repo.students().expect("students").len(), 5);
        assert_eq!(repo.tasks().expect("tasks").len(), 4);
        assert!(repo.messages().expect("messages").is_empty());

        let again = repo.initialize(true).expect("init again");
        assert_eq!(again, InitReport::default());
    }

    #[test]
    fn emptied_workspace_is_not_reseeded() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(1, "old thread of student 1", Role::Teacher)
            .expect("send");
        let custom = repo
            .create_task(individual("Custom", vec![2]))
            .expect("task");
        for id in 1..=5 {
            assert!(repo.delete_student(id).expect("delete"));
        }

        let report = repo.initialize(true).expect("reopen");
        assert!(!report.seeded);
        assert!(repo.students().expect("students").is_empty());
        assert!(repo.task(custom.id).expect("get").is_some());

        // A new student never inherits the deleted student's thread.
        let s = repo.add_student("Ahmed Ali", None).expect("student");
        assert!(s.id > 5);
        assert!(repo.thread(s.id).expect("thread").is_empty());
    }

    #[test]
    fn workspace_that_issued_ids_is_not_seeded() {
        let mut repo = ticking_repo();
        repo.initialize(false).expect("init");
        let a = repo.add_student("A", None).expect("a");
        repo.delete_student(a.id).expect("delete");

        let report = repo.initialize(true).expect("reopen");
        assert!(!report.seeded);
        assert!(repo.tasks().expect("tasks").is_empty());
    }

    #[test]
    fn seeded_ids_count_as_issued() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        assert_eq!(repo.store().get("idSeq.students").expect("get").as_deref(), Some("5"));
        assert_eq!(repo.store().get("idSeq.tasks").expect("get").as_deref(), Some("4"));
    }

    #[test]
    fn initialize_without_seed_leaves_collections_empty() {
        let mut repo = ticking_repo();
        let report = repo.initialize(false).expect("init");
        assert!(!report.seeded);
        assert!(repo.students().expect("students").is_empty());
        assert_eq!(repo.store().get("tasks").expect("get").as_deref(), Some("[]"));
    }

    #[test]
    fn ids_are_unique_under_a_frozen_clock() {
        let frozen: DateTime<Utc> = "2025-10-01T08:00:00Z".parse().expect("ts");
        let mut repo = Repository::with_clock(MemoryStore::new(), move || frozen);
        repo.initialize(false).expect("init");
        let a = repo.add_student("A", None).expect("a");
        let b = repo.add_student("B", None).expect("b");
        let c = repo.add_student("C", None).expect("c");
        assert_eq!(a.id, frozen.timestamp_millis());
        assert_eq!(b.id, a.id + 1);
        assert_eq!(c.id, b.id + 1);
    }

    #[test]
    fn deleted_ids_are_not_reissued() {
        let frozen: DateTime<Utc> = "2025-10-01T08:00:00Z".parse().expect("ts");
        let mut repo = Repository::with_clock(MemoryStore::new(), move || frozen);
        repo.initialize(false).expect("init");
        let a = repo.add_student("A", None).expect("a");
        assert!(repo.delete_student(a.id).expect("delete"));
        let b = repo.add_student("B", None).expect("b");
        assert!(b.id > a.id);
    }

    #[test]
    fn scenario_single_student_completes_homework() {
        let mut repo = ticking_repo();
        repo.initialize(false).expect("init");
        let ahmed = repo.add_student("Ahmed Ali", None).expect("student");
        let task = repo
            .create_task(NewTask {
                deadline: NaiveDate::from_ymd_opt(2025, 10, 15),
                ..individual("HW1", vec![ahmed.id])
            })
            .expect("task");
        assert!(task.completed_by.is_empty());

        let toggled = repo
            .toggle_completion(task.id, ahmed.id)
            .expect("toggle")
            .expect("task exists");
        assert_eq!(toggled.completed_by, vec![ahmed.id]);
        assert!(repo.is_completed_by(task.id, ahmed.id).expect("check"));

        let stats = repo.student_stats(ahmed.id).expect("stats");
        assert_eq!(
            stats,
            StudentStats {
                total: 1,
                completed: 1,
                pending: 0,
                percentage: 100
            }
        );
    }

    #[test]
    fn toggle_twice_restores_completion_set() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        let before = repo.task(2).expect("get").expect("task 2").completed_by;
        repo.toggle_completion(2, 3).expect("toggle");
        repo.toggle_completion(2, 3).expect("toggle back");
        assert_eq!(repo.task(2).expect("get").expect("task 2").completed_by, before);

        repo.toggle_completion(2, 1).expect("toggle existing");
        repo.toggle_completion(2, 1).expect("toggle back existing");
        let mut after = repo.task(2).expect("get").expect("task 2").completed_by;
        after.sort_unstable();
        assert_eq!(after, vec![1, 2]);
    }

    #[test]
    fn task_board_uses_repository_clock() {
        let now: DateTime<Utc> = "2025-10-16T09:00:00Z".parse().expect("ts");
        let mut repo = Repository::with_clock(MemoryStore::new(), move || now);
        repo.initialize(true).expect("init");

        // Student 4: tasks 1 (due 10-15) and 2 (due 10-20) pending, 4 (due 10-18) pending.
        let board = repo.student_task_board(4).expect("board");
        assert!(board.completed.is_empty());
        let flags: Vec<(i64, Option<i64>)> = board
            .pending
            .iter()
            .map(|v| (v.task.id, v.days_left))
            .collect();
        assert_eq!(flags, vec![(1, Some(-1)), (2, Some(4)), (4, Some(2))]);
        assert_eq!(board.pending[2].deadline_status, Some(stats::DeadlineStatus::Soon));
    }

    #[test]
    fn toggle_unknown_task_is_none() {
        let mut repo = ticking_repo();
        repo.initialize(false).expect("init");
        assert_eq!(repo.toggle_completion(42, 1).expect("toggle"), None);
        assert!(!repo.is_completed_by(42, 1).expect("check"));
    }

    #[test]
    fn delete_student_cascades_into_tasks() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        assert!(repo.delete_student(1).expect("delete"));

        assert!(repo.student(1).expect("get").is_none());
        assert!(repo.tasks_for_student(1).expect("tasks").is_empty());
        for task in repo.tasks().expect("tasks") {
            assert!(!task.assigned_to.contains(&1));
            assert!(!task.completed_by.contains(&1));
        }
        // Task 3 was completed only by student 1.
        assert!(repo.task(3).expect("get").expect("task").completed_by.is_empty());

        assert!(!repo.delete_student(1).expect("delete again"));
    }

    #[test]
    fn delete_student_keeps_thread_messages() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(2, "hello", Role::Teacher).expect("send");
        repo.delete_student(2).expect("delete");
        assert_eq!(repo.messages().expect("messages").len(), 1);
        assert!(repo
            .thread_summaries()
            .expect("threads")
            .iter()
            .all(|t| t.student.id != 2));
    }

    #[test]
    fn delete_task_is_idempotent() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        assert!(repo.delete_task(4).expect("delete"));
        assert!(!repo.delete_task(4).expect("delete again"));
        assert_eq!(repo.tasks().expect("tasks").len(), 3);
    }

    #[test]
    fn overall_stats_sum_rosters_and_completions() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        let s = repo.add_student("New", None).expect("student");
        let group = repo
            .create_task(NewTask {
                kind: TaskType::Group,
                ..individual("G", vec![1, 2, s.id])
            })
            .expect("group task");
        repo.toggle_completion(group.id, 1).expect("t1");
        repo.toggle_completion(group.id, s.id).expect("t2");

        let tasks = repo.tasks().expect("tasks");
        let o = repo.overall_stats().expect("overall");
        assert_eq!(
            o.total_assignments,
            tasks.iter().map(|t| t.assigned_to.len()).sum::<usize>()
        );
        assert_eq!(
            o.completed_assignments,
            tasks.iter().map(|t| t.completed_by.len()).sum::<usize>()
        );
        // Seed: 5+5+3+2 rosters, 1+2+1+0 completions.
        assert_eq!(o.total_assignments, 15 + 3);
        assert_eq!(o.completed_assignments, 4 + 2);
        assert_eq!(o.group_task_count, 2);
        assert_eq!(o.individual_task_count, 3);
        assert_eq!(o.total_students, 6);
    }

    #[test]
    fn create_task_drops_duplicate_roster_entries() {
        let mut repo = ticking_repo();
        repo.initialize(false).expect("init");
        let t = repo
            .create_task(individual("Dup", vec![7, 7, 8]))
            .expect("task");
        assert_eq!(t.assigned_to, vec![7, 8]);
    }

    #[test]
    fn thread_is_sorted_by_timestamp_regardless_of_insertion() {
        let repo = ticking_repo();
        let raw = serde_json::json!([
            {"id": 3, "studentId": 2, "message": "third", "sender": "teacher",
             "timestamp": "2025-10-03T10:00:00.000Z", "read": false},
            {"id": 1, "studentId": 2, "message": "first", "sender": "student",
             "timestamp": "2025-10-01T10:00:00.000Z", "read": true},
            {"id": 9, "studentId": 5, "message": "other", "sender": "student",
             "timestamp": "2025-10-02T09:00:00.000Z", "read": false},
            {"id": 2, "studentId": 2, "message": "second", "sender": "teacher",
             "timestamp": "2025-10-02T10:00:00.000Z", "read": false}
        ]);
        repo.store()
            .set("messages", &raw.to_string())
            .expect("write raw");

        let thread = repo.thread(2).expect("thread");
        let bodies: Vec<_> = thread.iter().map(|m| m.message.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second", "third"]);
        assert!(thread.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(
            repo.last_message(2).expect("last").map(|m| m.id),
            Some(3)
        );
        assert_eq!(repo.last_message(4).expect("none"), None);
    }

    #[test]
    fn scenario_unread_counts_per_role() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(2, "Please submit HW1", Role::Teacher)
            .expect("teacher msg");
        repo.send_message(2, "Will do", Role::Student)
            .expect("student msg");

        assert_eq!(repo.unread_count(2, Role::Student).expect("count"), 1);
        assert_eq!(repo.unread_count(2, Role::Teacher).expect("count"), 1);

        assert_eq!(repo.mark_read(2, Role::Student).expect("mark"), 1);
        assert_eq!(repo.unread_count(2, Role::Student).expect("count"), 0);
        assert_eq!(repo.unread_count(2, Role::Teacher).expect("count"), 1);

        let thread = repo.thread(2).expect("thread");
        let student_msg = thread
            .iter()
            .find(|m| m.sender == Role::Student)
            .expect("student message");
        assert!(!student_msg.read);
    }

    #[test]
    fn teacher_mark_read_only_touches_student_messages() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(3, "q1", Role::Student).expect("s1");
        repo.send_message(3, "a1", Role::Teacher).expect("t1");
        repo.send_message(3, "q2", Role::Student).expect("s2");
        repo.send_message(4, "elsewhere", Role::Student).expect("s3");

        assert_eq!(repo.mark_read(3, Role::Teacher).expect("mark"), 2);
        for m in repo.messages().expect("messages") {
            let expect_read = m.student_id == 3 && m.sender == Role::Student;
            assert_eq!(m.read, expect_read, "message {}", m.message);
        }
        assert_eq!(repo.mark_read(3, Role::Teacher).expect("mark again"), 0);
    }

    #[test]
    fn unread_total_for_teacher_spans_current_students() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(1, "a", Role::Student).expect("a");
        repo.send_message(2, "b", Role::Student).expect("b");
        repo.send_message(2, "c", Role::Teacher).expect("c");
        assert_eq!(repo.unread_total(Role::Teacher, None).expect("total"), 2);
        assert_eq!(repo.unread_total(Role::Student, Some(2)).expect("total"), 1);

        repo.delete_student(1).expect("delete");
        assert_eq!(repo.unread_total(Role::Teacher, None).expect("total"), 1);
    }

    #[test]
    fn thread_summaries_put_recent_first_and_silent_last() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        repo.send_message(4, "older", Role::Student).expect("older");
        repo.send_message(2, "newer", Role::Teacher).expect("newer");

        let summaries = repo.thread_summaries().expect("summaries");
        let order: Vec<_> = summaries.iter().map(|s| s.student.id).collect();
        assert_eq!(order, vec![2, 4, 1, 3, 5]);
        assert_eq!(summaries[0].unread_count, 0);
        assert_eq!(summaries[1].unread_count, 1);
        assert!(summaries[2].last_message.is_none());
    }

    #[test]
    fn corrupt_collection_is_an_error() {
        let repo = ticking_repo();
        repo.store().set("tasks", "{not json").expect("write");
        let e = repo.tasks().expect_err("corrupt");
        assert!(e.to_string().contains("tasks"));
    }

    #[test]
    fn subscribers_see_mutations() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        let rx = repo.subscribe();

        repo.toggle_completion(1, 2).expect("toggle");
        repo.send_message(2, "hi", Role::Teacher).expect("send");
        repo.mark_read(2, Role::Teacher).expect("no-op mark");

        let seen: Vec<Change> = rx.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                Change {
                    collection: Collection::Tasks,
                    student_id: Some(2)
                },
                Change {
                    collection: Collection::Messages,
                    student_id: Some(2)
                },
            ]
        );

        drop(rx);
        repo.send_message(2, "again", Role::Teacher).expect("send");
        assert!(repo.subscribers.is_empty());
    }

    #[test]
    fn replace_all_swaps_collections_and_keeps_ids_fresh() {
        let mut repo = ticking_repo();
        repo.initialize(true).expect("init");
        let students = vec![Student {
            id: 9_999_999_999_999,
            name: "Imported".into(),
            email: None,
        }];
        repo.replace_all(&students, &[], &[]).expect("replace");
        assert_eq!(repo.students().expect("students"), students);
        assert!(repo.tasks().expect("tasks").is_empty());

        let next = repo.add_student("After", None).expect("student");
        assert_eq!(next.id, 10_000_000_000_000);
    }
}
