//! services/tracker/src/adapters/sqlite.rs
//!
//! This module contains the local cache adapter, the concrete implementation of
//! the `LocalCache` port from the `core` crate. It keeps one SQLite table per
//! entity family using `sqlx`, and broadcasts the name of every table it writes
//! so that live queries can re-run.

use async_trait::async_trait;
use employee_tracker_core::domain::{
    Attendance, AttendanceStatus, Collection, EntityId, Message, MessageType, Priority, Review, Role, Task,
    TaskStatus, User,
};
use employee_tracker_core::ports::{LocalCache, PortError, PortResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Bumping this drops and recreates every table on the next start.
pub const SCHEMA_VERSION: i64 = 4;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

const CREATE_TABLES: [&str; 5] = [
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL,
        password TEXT NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        designation TEXT NOT NULL,
        department TEXT NOT NULL,
        joining_date TEXT NOT NULL,
        contact TEXT NOT NULL,
        profile_image TEXT NOT NULL
    )",
    "CREATE TABLE tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        priority TEXT NOT NULL,
        status TEXT NOT NULL,
        deadline TEXT NOT NULL,
        assigned_date TEXT NOT NULL,
        assigned_by TEXT NOT NULL
    )",
    "CREATE TABLE reviews (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        quality REAL NOT NULL,
        communication REAL NOT NULL,
        innovation REAL NOT NULL,
        timeliness REAL NOT NULL,
        attendance REAL NOT NULL,
        overall_rating REAL NOT NULL,
        remarks TEXT NOT NULL,
        reviewed_by TEXT NOT NULL
    )",
    "CREATE TABLE messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        receiver_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        message TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        is_read INTEGER NOT NULL,
        message_type TEXT NOT NULL,
        related_review_id INTEGER
    )",
    "CREATE TABLE attendance (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        employee_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        date TEXT NOT NULL,
        check_in_time TEXT NOT NULL,
        check_out_time TEXT,
        status TEXT NOT NULL,
        remarks TEXT NOT NULL,
        marked_by TEXT NOT NULL
    )",
];

/// Children first so the drops never trip a foreign key.
const DROP_TABLES: [&str; 5] = [
    "DROP TABLE IF EXISTS attendance",
    "DROP TABLE IF EXISTS messages",
    "DROP TABLE IF EXISTS reviews",
    "DROP TABLE IF EXISTS tasks",
    "DROP TABLE IF EXISTS users",
];

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A local cache adapter that implements the `LocalCache` port on SQLite.
#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    changes: broadcast::Sender<Collection>,
}

impl SqliteCache {
    /// Creates a new `SqliteCache` over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { pool, changes }
    }

    /// Opens (creating if needed) the database at `url` with foreign keys enforced.
    ///
    /// Connections are never recycled, so a `sqlite::memory:` database with a
    /// single connection lives as long as the pool.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the tables. A database stamped with any other schema version
    /// loses all five tables and starts empty.
    pub async fn prepare_schema(&self) -> Result<(), sqlx::Error> {
        let version: i64 = sqlx::query_scalar("PRAGMA user_version")
            .fetch_one(&self.pool)
            .await?;
        if version == SCHEMA_VERSION {
            debug!(version, "local schema is current");
            return Ok(());
        }

        if version != 0 {
            warn!(found = version, expected = SCHEMA_VERSION, "local schema version changed, recreating tables");
        }
        let mut tx = self.pool.begin().await?;
        for statement in DROP_TABLES.iter().chain(CREATE_TABLES.iter()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        info!(version = SCHEMA_VERSION, "local schema created");
        Ok(())
    }

    /// Inserts the built-in admin when the cache has no employees and no user
    /// with that email yet. Returns whether a row was inserted.
    pub async fn seed_admin(&self, email: &str, password: &str) -> PortResult<bool> {
        if self.employee_count().await? > 0 {
            return Ok(false);
        }
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        if existing > 0 {
            return Ok(false);
        }

        let admin = User {
            email: email.to_string(),
            password: password.to_string(),
            name: "Admin User".to_string(),
            role: Role::Admin,
            designation: "System Administrator".to_string(),
            department: "Management".to_string(),
            joining_date: "2024-01-01".to_string(),
            ..User::default()
        };
        let id = self.upsert_user(&admin).await?;
        info!(id, %email, "seeded admin user");
        Ok(true)
    }

    fn notify(&self, table: Collection) {
        // No receivers is fine: nobody is watching.
        let _ = self.changes.send(table);
    }
}

fn storage(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

/// `0` asks SQLite to allocate the id.
fn id_param(id: EntityId) -> Option<EntityId> {
    (id != 0).then_some(id)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: i64,
    email: String,
    password: String,
    name: String,
    role: String,
    designation: String,
    department: String,
    joining_date: String,
    contact: String,
    profile_image: String,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            password: self.password,
            name: self.name,
            role: Role::parse(&self.role).unwrap_or_default(),
            designation: self.designation,
            department: self.department,
            joining_date: self.joining_date,
            contact: self.contact,
            profile_image: self.profile_image,
        }
    }
}

#[derive(FromRow)]
struct TaskRecord {
    id: i64,
    employee_id: i64,
    title: String,
    description: String,
    priority: String,
    status: String,
    deadline: String,
    assigned_date: String,
    assigned_by: String,
}
impl TaskRecord {
    fn to_domain(self) -> Task {
        Task {
            id: self.id,
            employee_id: self.employee_id,
            title: self.title,
            description: self.description,
            priority: Priority::parse(&self.priority).unwrap_or_default(),
            status: TaskStatus::parse(&self.status).unwrap_or_default(),
            deadline: self.deadline,
            assigned_date: self.assigned_date,
            assigned_by: self.assigned_by,
        }
    }
}

#[derive(FromRow)]
struct ReviewRecord {
    id: i64,
    employee_id: i64,
    date: String,
    quality: f64,
    communication: f64,
    innovation: f64,
    timeliness: f64,
    attendance: f64,
    overall_rating: f64,
    remarks: String,
    reviewed_by: String,
}
impl ReviewRecord {
    fn to_domain(self) -> Review {
        Review {
            id: self.id,
            employee_id: self.employee_id,
            date: self.date,
            quality: self.quality as f32,
            communication: self.communication as f32,
            innovation: self.innovation as f32,
            timeliness: self.timeliness as f32,
            attendance: self.attendance as f32,
            overall_rating: self.overall_rating as f32,
            remarks: self.remarks,
            reviewed_by: self.reviewed_by,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    message: String,
    timestamp: i64,
    is_read: bool,
    message_type: String,
    related_review_id: Option<i64>,
}
impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            text: self.message,
            timestamp: self.timestamp,
            is_read: self.is_read,
            message_type: MessageType::parse(&self.message_type).unwrap_or_default(),
            related_review_id: self.related_review_id,
        }
    }
}

#[derive(FromRow)]
struct AttendanceRecord {
    id: i64,
    employee_id: i64,
    date: String,
    check_in_time: String,
    check_out_time: Option<String>,
    status: String,
    remarks: String,
    marked_by: String,
}
impl AttendanceRecord {
    fn to_domain(self) -> Attendance {
        Attendance {
            id: self.id,
            employee_id: self.employee_id,
            date: self.date,
            check_in_time: self.check_in_time,
            check_out_time: self.check_out_time,
            status: AttendanceStatus::parse(&self.status).unwrap_or_default(),
            remarks: self.remarks,
            marked_by: self.marked_by,
        }
    }
}

//=========================================================================================
// `LocalCache` Trait Implementation
//=========================================================================================

#[async_trait]
impl LocalCache for SqliteCache {
    // --- Users ---

    async fn upsert_user(&self, user: &User) -> PortResult<EntityId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (id, email, password, name, role, designation, department, joining_date, contact, profile_image)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                email = excluded.email, password = excluded.password, name = excluded.name,
                role = excluded.role, designation = excluded.designation, department = excluded.department,
                joining_date = excluded.joining_date, contact = excluded.contact, profile_image = excluded.profile_image
             RETURNING id",
        )
        .bind(id_param(user.id))
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.designation)
        .bind(&user.department)
        .bind(&user.joining_date)
        .bind(&user.contact)
        .bind(&user.profile_image)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        self.notify(Collection::Users);
        Ok(id)
    }

    async fn get_user(&self, id: EntityId) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn find_user_by_credentials(&self, email: &str, password: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE email = ? AND password = ? LIMIT 1")
            .bind(email)
            .bind(password)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(UserRecord::to_domain))
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(UserRecord::to_domain).collect())
    }

    async fn list_employees(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE role = ? ORDER BY id")
            .bind(Role::Employee.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(UserRecord::to_domain).collect())
    }

    async fn delete_user(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        // The cascade may have touched every child table.
        for table in Collection::ALL {
            self.notify(table);
        }
        Ok(())
    }

    async fn employee_count(&self) -> PortResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
            .bind(Role::Employee.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    // --- Tasks ---

    async fn upsert_task(&self, task: &Task) -> PortResult<EntityId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO tasks (id, employee_id, title, description, priority, status, deadline, assigned_date, assigned_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                employee_id = excluded.employee_id, title = excluded.title, description = excluded.description,
                priority = excluded.priority, status = excluded.status, deadline = excluded.deadline,
                assigned_date = excluded.assigned_date, assigned_by = excluded.assigned_by
             RETURNING id",
        )
        .bind(id_param(task.id))
        .bind(task.employee_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.status.as_str())
        .bind(&task.deadline)
        .bind(&task.assigned_date)
        .bind(&task.assigned_by)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        self.notify(Collection::Tasks);
        Ok(id)
    }

    async fn get_task(&self, id: EntityId) -> PortResult<Option<Task>> {
        let record = sqlx::query_as::<_, TaskRecord>("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(TaskRecord::to_domain))
    }

    async fn list_tasks(&self) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>("SELECT * FROM tasks ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(TaskRecord::to_domain).collect())
    }

    async fn list_tasks_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>("SELECT * FROM tasks WHERE employee_id = ? ORDER BY id")
            .bind(employee_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(TaskRecord::to_domain).collect())
    }

    async fn delete_task(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Tasks);
        Ok(())
    }

    // --- Reviews ---

    async fn upsert_review(&self, review: &Review) -> PortResult<EntityId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO reviews (id, employee_id, date, quality, communication, innovation, timeliness, attendance, overall_rating, remarks, reviewed_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                employee_id = excluded.employee_id, date = excluded.date, quality = excluded.quality,
                communication = excluded.communication, innovation = excluded.innovation,
                timeliness = excluded.timeliness, attendance = excluded.attendance,
                overall_rating = excluded.overall_rating, remarks = excluded.remarks, reviewed_by = excluded.reviewed_by
             RETURNING id",
        )
        .bind(id_param(review.id))
        .bind(review.employee_id)
        .bind(&review.date)
        .bind(review.quality as f64)
        .bind(review.communication as f64)
        .bind(review.innovation as f64)
        .bind(review.timeliness as f64)
        .bind(review.attendance as f64)
        .bind(review.overall_rating as f64)
        .bind(&review.remarks)
        .bind(&review.reviewed_by)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        self.notify(Collection::Reviews);
        Ok(id)
    }

    async fn get_review(&self, id: EntityId) -> PortResult<Option<Review>> {
        let record = sqlx::query_as::<_, ReviewRecord>("SELECT * FROM reviews WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(ReviewRecord::to_domain))
    }

    async fn list_reviews(&self) -> PortResult<Vec<Review>> {
        let records = sqlx::query_as::<_, ReviewRecord>("SELECT * FROM reviews ORDER BY date DESC, id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(ReviewRecord::to_domain).collect())
    }

    async fn list_reviews_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Review>> {
        let records =
            sqlx::query_as::<_, ReviewRecord>("SELECT * FROM reviews WHERE employee_id = ? ORDER BY date DESC, id")
                .bind(employee_id)
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
        Ok(records.into_iter().map(ReviewRecord::to_domain).collect())
    }

    async fn delete_review(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Reviews);
        Ok(())
    }

    // --- Messages ---

    async fn upsert_message(&self, message: &Message) -> PortResult<EntityId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (id, sender_id, receiver_id, message, timestamp, is_read, message_type, related_review_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                sender_id = excluded.sender_id, receiver_id = excluded.receiver_id, message = excluded.message,
                timestamp = excluded.timestamp, is_read = excluded.is_read, message_type = excluded.message_type,
                related_review_id = excluded.related_review_id
             RETURNING id",
        )
        .bind(id_param(message.id))
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.text)
        .bind(message.timestamp)
        .bind(message.is_read)
        .bind(message.message_type.as_str())
        .bind(message.related_review_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        self.notify(Collection::Messages);
        Ok(id)
    }

    async fn get_message(&self, id: EntityId) -> PortResult<Option<Message>> {
        let record = sqlx::query_as::<_, MessageRecord>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(MessageRecord::to_domain))
    }

    async fn list_messages(&self) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>("SELECT * FROM messages ORDER BY timestamp DESC, id")
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn list_messages_for_user(&self, user_id: EntityId) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM messages WHERE sender_id = ? OR receiver_id = ? ORDER BY timestamp DESC, id",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn conversation(&self, user_id: EntityId, other_id: EntityId) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM messages
             WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
             ORDER BY timestamp ASC, id",
        )
        .bind(user_id)
        .bind(other_id)
        .bind(other_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn unread_messages(&self, user_id: EntityId) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT * FROM messages WHERE receiver_id = ? AND is_read = 0 ORDER BY timestamp DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(MessageRecord::to_domain).collect())
    }

    async fn unread_count(&self, user_id: EntityId) -> PortResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE receiver_id = ? AND is_read = 0")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }

    async fn mark_message_read(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("UPDATE messages SET is_read = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Messages);
        Ok(())
    }

    async fn mark_conversation_read(&self, user_id: EntityId, sender_id: EntityId) -> PortResult<()> {
        sqlx::query("UPDATE messages SET is_read = 1 WHERE receiver_id = ? AND sender_id = ?")
            .bind(user_id)
            .bind(sender_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Messages);
        Ok(())
    }

    async fn delete_message(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Messages);
        Ok(())
    }

    async fn conversation_partners(&self, user_id: EntityId) -> PortResult<Vec<EntityId>> {
        sqlx::query_scalar(
            "SELECT sender_id FROM messages WHERE receiver_id = ?
             UNION
             SELECT receiver_id FROM messages WHERE sender_id = ?
             ORDER BY 1",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)
    }

    // --- Attendance ---

    async fn upsert_attendance(&self, attendance: &Attendance) -> PortResult<EntityId> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO attendance (id, employee_id, date, check_in_time, check_out_time, status, remarks, marked_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                employee_id = excluded.employee_id, date = excluded.date, check_in_time = excluded.check_in_time,
                check_out_time = excluded.check_out_time, status = excluded.status, remarks = excluded.remarks,
                marked_by = excluded.marked_by
             RETURNING id",
        )
        .bind(id_param(attendance.id))
        .bind(attendance.employee_id)
        .bind(&attendance.date)
        .bind(&attendance.check_in_time)
        .bind(&attendance.check_out_time)
        .bind(attendance.status.as_str())
        .bind(&attendance.remarks)
        .bind(&attendance.marked_by)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        self.notify(Collection::Attendance);
        Ok(id)
    }

    async fn get_attendance(&self, id: EntityId) -> PortResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(AttendanceRecord::to_domain))
    }

    async fn list_attendance(&self) -> PortResult<Vec<Attendance>> {
        let records =
            sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance ORDER BY date DESC, check_in_time DESC, id")
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?;
        Ok(records.into_iter().map(AttendanceRecord::to_domain).collect())
    }

    async fn list_attendance_for_employee(&self, employee_id: EntityId) -> PortResult<Vec<Attendance>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance WHERE employee_id = ? ORDER BY date DESC, id",
        )
        .bind(employee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(AttendanceRecord::to_domain).collect())
    }

    async fn list_attendance_for_date(&self, date: &str) -> PortResult<Vec<Attendance>> {
        let records = sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance WHERE date = ? ORDER BY id")
            .bind(date)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(AttendanceRecord::to_domain).collect())
    }

    async fn attendance_on(&self, employee_id: EntityId, date: &str) -> PortResult<Option<Attendance>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance WHERE employee_id = ? AND date = ? ORDER BY id LIMIT 1",
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(record.map(AttendanceRecord::to_domain))
    }

    async fn delete_attendance(&self, id: EntityId) -> PortResult<()> {
        sqlx::query("DELETE FROM attendance WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        self.notify(Collection::Attendance);
        Ok(())
    }

    // --- Change notification ---

    fn changes(&self) -> broadcast::Receiver<Collection> {
        self.changes.subscribe()
    }
}
