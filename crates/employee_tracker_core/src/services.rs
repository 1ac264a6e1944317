//! crates/employee_tracker_core/src/services.rs
//!
//! One service per entity family. Each opens feeds that follow the remote tree
//! and mirror it into the local cache, and routes writes remote-first through
//! `WriteThrough`. Local-cache queries are ordered the same way as the shaped
//! remote feeds so that a fallback does not reorder what observers see.

use crate::domain::{Attendance, EntityId, Message, MessageType, Review, ReviewScores, Task, TaskStatus, User};
use crate::live::live_query;
use crate::ports::{LocalCache, PortError, PortResult};
use crate::remote::RemoteRepository;
use crate::sync::{spawn_feed, CachedRecord, Feed, LocalFallback, WriteOutcome, WriteThrough};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{info, warn};

/// Opens a feed whose remote side is shaped by `shape` and whose fallback runs `query`.
fn open_feed<T, S, Q>(writer: &WriteThrough, label: &'static str, shape: S, query: Q) -> Feed<T>
where
    T: CachedRecord,
    S: Fn(Vec<T>) -> Vec<T> + Send + 'static,
    Q: Fn(Arc<dyn LocalCache>) -> BoxFuture<'static, PortResult<Vec<T>>> + Send + Sync + 'static,
{
    let remote = writer.remote.clone();
    let opening = async move { remote.watch_with(shape).await }.boxed();
    let fallback: LocalFallback<T> = Box::new(move |cache| live_query(cache, T::COLLECTION, query));
    spawn_feed(label, opening, writer.cache.clone(), fallback)
}

//=========================================================================================
// Employees
//=========================================================================================

#[derive(Clone)]
pub struct EmployeeService {
    writer: WriteThrough,
}

impl EmployeeService {
    pub fn new(writer: WriteThrough) -> Self {
        Self { writer }
    }

    /// Users with the `employee` role.
    pub fn watch_employees(&self) -> Feed<User> {
        open_feed(
            &self.writer,
            "employees",
            |users: Vec<User>| {
                let mut employees: Vec<User> = users.into_iter().filter(User::is_employee).collect();
                employees.sort_by_key(|u| u.id);
                employees
            },
            |cache| async move { cache.list_employees().await }.boxed(),
        )
    }

    /// Every account, admins included.
    pub fn watch_users(&self) -> Feed<User> {
        open_feed(
            &self.writer,
            "users",
            |mut users: Vec<User>| {
                users.sort_by_key(|u| u.id);
                users
            },
            |cache| async move { cache.list_users().await }.boxed(),
        )
    }

    pub async fn add_employee(&self, user: User) -> PortResult<WriteOutcome<User>> {
        if user.email.trim().is_empty() {
            return Err(PortError::InvalidInput("email must not be empty".to_string()));
        }
        self.writer.add(user).await
    }

    pub async fn update_employee(&self, user: User) -> PortResult<WriteOutcome<User>> {
        self.writer.update(user).await
    }

    /// Removes the user. The local cache cascades to the user's tasks, reviews,
    /// messages and attendance; the remote tree keeps them.
    pub async fn delete_employee(&self, id: EntityId) -> PortResult<WriteOutcome<EntityId>> {
        self.writer.delete::<User>(id).await
    }

    /// Looks the user up in the local cache.
    pub async fn employee(&self, id: EntityId) -> PortResult<Option<User>> {
        self.writer.cache.get_user(id).await
    }

    /// Checks the credentials against the local cache, where the seeded admin
    /// and every mirrored user live, then against the remote `users` collection
    /// for accounts that have not been mirrored yet. A failing remote read
    /// counts as no match.
    pub async fn login(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        if let Some(user) = self.writer.cache.find_user_by_credentials(email, password).await? {
            return Ok(Some(user));
        }
        match self.writer.remote.login(email, password).await {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "remote login failed, no local match either");
                Ok(None)
            }
        }
    }
}

//=========================================================================================
// Tasks
//=========================================================================================

#[derive(Clone)]
pub struct TaskService {
    writer: WriteThrough,
}

impl TaskService {
    pub fn new(writer: WriteThrough) -> Self {
        Self { writer }
    }

    pub fn watch_all(&self) -> Feed<Task> {
        open_feed(
            &self.writer,
            "tasks",
            |mut tasks: Vec<Task>| {
                tasks.sort_by_key(|t| t.id);
                tasks
            },
            |cache| async move { cache.list_tasks().await }.boxed(),
        )
    }

    pub fn watch_for_employee(&self, employee_id: EntityId) -> Feed<Task> {
        open_feed(
            &self.writer,
            "employee_tasks",
            move |tasks: Vec<Task>| {
                let mut own: Vec<Task> = tasks.into_iter().filter(|t| t.employee_id == employee_id).collect();
                own.sort_by_key(|t| t.id);
                own
            },
            move |cache| async move { cache.list_tasks_for_employee(employee_id).await }.boxed(),
        )
    }

    pub async fn add_task(&self, task: Task) -> PortResult<WriteOutcome<Task>> {
        if task.title.trim().is_empty() {
            return Err(PortError::InvalidInput("task title must not be empty".to_string()));
        }
        self.writer.add(task).await
    }

    pub async fn update_task(&self, task: Task) -> PortResult<WriteOutcome<Task>> {
        self.writer.update(task).await
    }

    /// Rewrites the whole task with a new status. The current task is read from the local cache.
    pub async fn update_status(&self, id: EntityId, status: TaskStatus) -> PortResult<WriteOutcome<Task>> {
        let task = self
            .writer
            .cache
            .get_task(id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("task {id}")))?;
        info!(task = id, from = %task.status, to = %status, "changing task status");
        self.writer.update(Task { status, ..task }).await
    }

    pub async fn delete_task(&self, id: EntityId) -> PortResult<WriteOutcome<EntityId>> {
        self.writer.delete::<Task>(id).await
    }
}

//=========================================================================================
// Reviews
//=========================================================================================

#[derive(Clone)]
pub struct ReviewService {
    writer: WriteThrough,
}

impl ReviewService {
    pub fn new(writer: WriteThrough) -> Self {
        Self { writer }
    }

    /// Every review, newest first.
    pub fn watch_all(&self) -> Feed<Review> {
        open_feed(
            &self.writer,
            "reviews",
            |mut reviews: Vec<Review>| {
                reviews.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
                reviews
            },
            |cache| async move { cache.list_reviews().await }.boxed(),
        )
    }

    /// One employee's reviews, newest first.
    pub fn watch_for_employee(&self, employee_id: EntityId) -> Feed<Review> {
        open_feed(
            &self.writer,
            "employee_reviews",
            move |reviews: Vec<Review>| {
                let mut own: Vec<Review> = reviews.into_iter().filter(|r| r.employee_id == employee_id).collect();
                own.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
                own
            },
            move |cache| async move { cache.list_reviews_for_employee(employee_id).await }.boxed(),
        )
    }

    /// Validates the scores and stores a new review whose overall rating is their mean.
    pub async fn submit_review(
        &self,
        employee_id: EntityId,
        date: impl Into<String>,
        scores: ReviewScores,
        remarks: impl Into<String>,
        reviewed_by: impl Into<String>,
    ) -> PortResult<WriteOutcome<Review>> {
        if let Some(field) = scores.out_of_range() {
            return Err(PortError::InvalidInput(format!("{field} must be between 0 and 5")));
        }
        let review = Review::from_scores(employee_id, date, scores, remarks, reviewed_by);
        self.writer.add(review).await
    }

    pub async fn delete_review(&self, id: EntityId) -> PortResult<WriteOutcome<EntityId>> {
        self.writer.delete::<Review>(id).await
    }
}

//=========================================================================================
// Messages
//=========================================================================================

#[derive(Clone)]
pub struct MessageService {
    writer: WriteThrough,
}

impl MessageService {
    pub fn new(writer: WriteThrough) -> Self {
        Self { writer }
    }

    /// Every message, newest first.
    pub fn watch_all(&self) -> Feed<Message> {
        open_feed(
            &self.writer,
            "messages",
            |mut messages: Vec<Message>| {
                messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
                messages
            },
            |cache| async move { cache.list_messages().await }.boxed(),
        )
    }

    /// Everything the user sent or received, newest first.
    pub fn watch_for_user(&self, user_id: EntityId) -> Feed<Message> {
        open_feed(
            &self.writer,
            "user_messages",
            move |messages: Vec<Message>| {
                let mut own: Vec<Message> = messages.into_iter().filter(|m| m.involves(user_id)).collect();
                own.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.id.cmp(&b.id)));
                own
            },
            move |cache| async move { cache.list_messages_for_user(user_id).await }.boxed(),
        )
    }

    /// The exchange between two users, oldest first.
    pub fn watch_conversation(&self, user_id: EntityId, other_id: EntityId) -> Feed<Message> {
        open_feed(
            &self.writer,
            "conversation",
            move |messages: Vec<Message>| {
                let mut thread: Vec<Message> =
                    messages.into_iter().filter(|m| m.is_between(user_id, other_id)).collect();
                thread.sort_by_key(|m| (m.timestamp, m.id));
                thread
            },
            move |cache| async move { cache.conversation(user_id, other_id).await }.boxed(),
        )
    }

    pub async fn send(
        &self,
        sender_id: EntityId,
        receiver_id: EntityId,
        text: impl Into<String>,
        message_type: MessageType,
        related_review_id: Option<EntityId>,
    ) -> PortResult<WriteOutcome<Message>> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(PortError::InvalidInput("message must not be empty".to_string()));
        }
        let message = Message::compose(sender_id, receiver_id, text, message_type, related_review_id);
        self.writer.add(message).await
    }

    /// Rewrites the whole message with `isRead = true`.
    pub async fn mark_read(&self, id: EntityId) -> PortResult<WriteOutcome<Message>> {
        let message = self
            .writer
            .cache
            .get_message(id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("message {id}")))?;
        self.writer.update(Message { is_read: true, ..message }).await
    }

    /// Marks every unread message from `sender_id` to `user_id` as read.
    pub async fn mark_conversation_read(
        &self,
        user_id: EntityId,
        sender_id: EntityId,
    ) -> PortResult<Vec<WriteOutcome<Message>>> {
        let unread: Vec<Message> = self
            .writer
            .cache
            .conversation(user_id, sender_id)
            .await?
            .into_iter()
            .filter(|m| m.sender_id == sender_id && m.receiver_id == user_id && !m.is_read)
            .collect();

        let mut outcomes = Vec::with_capacity(unread.len());
        for message in unread {
            outcomes.push(self.writer.update(Message { is_read: true, ..message }).await?);
        }
        Ok(outcomes)
    }

    pub async fn delete_message(&self, id: EntityId) -> PortResult<WriteOutcome<EntityId>> {
        self.writer.delete::<Message>(id).await
    }

    /// Ids of everyone the user has exchanged messages with.
    pub async fn partners(&self, user_id: EntityId) -> PortResult<Vec<EntityId>> {
        self.writer.cache.conversation_partners(user_id).await
    }
}

//=========================================================================================
// Attendance
//=========================================================================================

#[derive(Clone)]
pub struct AttendanceService {
    writer: WriteThrough,
}

impl AttendanceService {
    pub fn new(writer: WriteThrough) -> Self {
        Self { writer }
    }

    /// All marks, newest date first, then latest check-in first.
    pub fn watch_all(&self) -> Feed<Attendance> {
        open_feed(
            &self.writer,
            "attendance",
            |mut marks: Vec<Attendance>| {
                marks.sort_by(|a, b| {
                    b.date
                        .cmp(&a.date)
                        .then_with(|| b.check_in_time.cmp(&a.check_in_time))
                        .then(a.id.cmp(&b.id))
                });
                marks
            },
            |cache| async move { cache.list_attendance().await }.boxed(),
        )
    }

    pub fn watch_for_employee(&self, employee_id: EntityId) -> Feed<Attendance> {
        open_feed(
            &self.writer,
            "employee_attendance",
            move |marks: Vec<Attendance>| {
                let mut own: Vec<Attendance> = marks.into_iter().filter(|a| a.employee_id == employee_id).collect();
                own.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
                own
            },
            move |cache| async move { cache.list_attendance_for_employee(employee_id).await }.boxed(),
        )
    }

    pub fn watch_for_date(&self, date: impl Into<String>) -> Feed<Attendance> {
        let date: Arc<str> = Arc::from(date.into());
        let filter_date = date.clone();
        open_feed(
            &self.writer,
            "daily_attendance",
            move |marks: Vec<Attendance>| {
                let mut day: Vec<Attendance> = marks.into_iter().filter(|a| *a.date == *filter_date).collect();
                day.sort_by_key(|a| a.id);
                day
            },
            move |cache| {
                let date = date.clone();
                async move { cache.list_attendance_for_date(&date).await }.boxed()
            },
        )
    }

    pub async fn mark_attendance(&self, attendance: Attendance) -> PortResult<WriteOutcome<Attendance>> {
        if attendance.date.is_empty() {
            return Err(PortError::InvalidInput("attendance date must not be empty".to_string()));
        }
        self.writer.add(attendance).await
    }

    pub async fn update_attendance(&self, attendance: Attendance) -> PortResult<WriteOutcome<Attendance>> {
        self.writer.update(attendance).await
    }

    /// The employee's mark for `date` in the local cache, if any.
    pub async fn attendance_on(&self, employee_id: EntityId, date: &str) -> PortResult<Option<Attendance>> {
        self.writer.cache.attendance_on(employee_id, date).await
    }
}

//=========================================================================================
// Bundle
//=========================================================================================

/// All five family services over one remote accessor and one cache.
#[derive(Clone)]
pub struct Services {
    pub employees: EmployeeService,
    pub tasks: TaskService,
    pub reviews: ReviewService,
    pub messages: MessageService,
    pub attendance: AttendanceService,
}

impl Services {
    pub fn new(remote: RemoteRepository, cache: Arc<dyn LocalCache>) -> Self {
        let writer = WriteThrough::new(remote, cache);
        Self {
            employees: EmployeeService::new(writer.clone()),
            tasks: TaskService::new(writer.clone()),
            reviews: ReviewService::new(writer.clone()),
            messages: MessageService::new(writer.clone()),
            attendance: AttendanceService::new(writer),
        }
    }
}
