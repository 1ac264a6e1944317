//! crates/employee_tracker_core/src/records.rs
//!
//! Mapping between typed entities and the loosely typed documents of the
//! remote tree. Missing fields fall back to defaults,
//! and a field that is present but unusable marks only its own record as
//! malformed, so one bad child never aborts the parse of a whole snapshot.

use crate::domain::{
    Attendance, AttendanceStatus, Collection, EntityId, Message, MessageType, Priority, Review, Role, Task,
    TaskStatus, User,
};
use crate::ports::Document;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// A single field of a remote document that could not be coerced.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("field `{field}` has an unusable value: {value}")]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
}

impl FieldError {
    fn new(field: &'static str, value: &Value) -> Self {
        Self {
            field,
            value: value.to_string(),
        }
    }
}

//=========================================================================================
// RemoteRecord
//=========================================================================================

/// An entity that lives in one collection of the remote tree.
pub trait RemoteRecord: Sized + Clone + Serialize + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> EntityId;

    fn with_id(self, id: EntityId) -> Self;

    /// Flat map of primitive fields written at `<collection>/<id>`.
    fn to_document(&self) -> Document {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Document::new(),
        }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError>;
}

/// Parses an entire collection node into typed records.
///
/// Children that are not objects, or that contain a malformed field, are
/// logged and skipped. When a child has no usable `id`, its key is used
/// instead if it is numeric.
pub fn parse_snapshot<T: RemoteRecord>(collection: &Value) -> Vec<T> {
    let children: Vec<(String, &Value)> = match collection {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        // Sparse integer keys can come back as an array.
        Value::Array(items) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    };

    let mut records = Vec::with_capacity(children.len());
    for (key, child) in children {
        let Value::Object(document) = child else {
            warn!(collection = %T::COLLECTION, %key, "skipping non-object child");
            continue;
        };
        match T::from_document(document) {
            Ok(record) => {
                let record = match (record.id(), key.parse::<EntityId>()) {
                    (0, Ok(id)) => record.with_id(id),
                    _ => record,
                };
                records.push(record);
            }
            Err(e) => warn!(collection = %T::COLLECTION, %key, error = %e, "skipping malformed record"),
        }
    }
    records
}

//=========================================================================================
// Field coercion
//=========================================================================================

/// Read-only view over a document with per-type coercion rules.
struct Fields<'a>(&'a Document);

impl<'a> Fields<'a> {
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.0.get(field).filter(|v| !v.is_null())
    }

    fn int(&self, field: &'static str) -> Result<i64, FieldError> {
        Ok(self.opt_int(field)?.unwrap_or(0))
    }

    fn opt_int(&self, field: &'static str) -> Result<Option<i64>, FieldError> {
        let Some(value) = self.get(field) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.map(Some).ok_or_else(|| FieldError::new(field, value))
    }

    fn float(&self, field: &'static str) -> Result<f32, FieldError> {
        let Some(value) = self.get(field) else {
            return Ok(0.0);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed
            .filter(|f| f.is_finite())
            .map(|f| f as f32)
            .ok_or_else(|| FieldError::new(field, value))
    }

    fn text(&self, field: &'static str) -> Result<String, FieldError> {
        Ok(self.opt_text(field)?.unwrap_or_default())
    }

    fn opt_text(&self, field: &'static str) -> Result<Option<String>, FieldError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
            Some(v) => Err(FieldError::new(field, v)),
        }
    }

    fn boolean(&self, field: &'static str) -> Result<bool, FieldError> {
        match self.get(field) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(v @ Value::String(s)) => match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(FieldError::new(field, v)),
            },
            Some(v) => Err(FieldError::new(field, v)),
        }
    }

    fn enumeration<E: Default>(
        &self,
        field: &'static str,
        parse: fn(&str) -> Option<E>,
    ) -> Result<E, FieldError> {
        match self.get(field) {
            None => Ok(E::default()),
            Some(Value::String(s)) if s.is_empty() => Ok(E::default()),
            Some(v @ Value::String(s)) => parse(s).ok_or_else(|| FieldError::new(field, v)),
            Some(v) => Err(FieldError::new(field, v)),
        }
    }
}

//=========================================================================================
// Per-entity mappings
//=========================================================================================

impl RemoteRecord for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError> {
        let f = Fields(document);
        Ok(Self {
            id: f.int("id")?,
            email: f.text("email")?,
            password: f.text("password")?,
            name: f.text("name")?,
            role: f.enumeration("role", Role::parse)?,
            designation: f.text("designation")?,
            department: f.text("department")?,
            joining_date: f.text("joiningDate")?,
            contact: f.text("contact")?,
            profile_image: f.text("profileImage")?,
        })
    }
}

impl RemoteRecord for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError> {
        let f = Fields(document);
        Ok(Self {
            id: f.int("id")?,
            employee_id: f.int("employeeId")?,
            title: f.text("title")?,
            description: f.text("description")?,
            priority: f.enumeration("priority", Priority::parse)?,
            status: f.enumeration("status", TaskStatus::parse)?,
            deadline: f.text("deadline")?,
            assigned_date: f.text("assignedDate")?,
            assigned_by: f.text("assignedBy")?,
        })
    }
}

impl RemoteRecord for Review {
    const COLLECTION: Collection = Collection::Reviews;

    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError> {
        let f = Fields(document);
        Ok(Self {
            id: f.int("id")?,
            employee_id: f.int("employeeId")?,
            date: f.text("date")?,
            quality: f.float("quality")?,
            communication: f.float("communication")?,
            innovation: f.float("innovation")?,
            timeliness: f.float("timeliness")?,
            attendance: f.float("attendance")?,
            overall_rating: f.float("overallRating")?,
            remarks: f.text("remarks")?,
            reviewed_by: f.text("reviewedBy")?,
        })
    }
}

impl RemoteRecord for Message {
    const COLLECTION: Collection = Collection::Messages;

    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError> {
        let f = Fields(document);
        Ok(Self {
            id: f.int("id")?,
            sender_id: f.int("senderId")?,
            receiver_id: f.int("receiverId")?,
            text: f.text("message")?,
            timestamp: f.int("timestamp")?,
            is_read: f.boolean("isRead")?,
            message_type: f.enumeration("messageType", MessageType::parse)?,
            // Older writers store 0 for "no review".
            related_review_id: f.opt_int("relatedReviewId")?.filter(|id| *id != 0),
        })
    }
}

impl RemoteRecord for Attendance {
    const COLLECTION: Collection = Collection::Attendance;

    fn id(&self) -> EntityId {
        self.id
    }

    fn with_id(self, id: EntityId) -> Self {
        Self { id, ..self }
    }

    fn from_document(document: &Document) -> Result<Self, FieldError> {
        let f = Fields(document);
        Ok(Self {
            id: f.int("id")?,
            employee_id: f.int("employeeId")?,
            date: f.text("date")?,
            check_in_time: f.text("checkInTime")?,
            check_out_time: f.opt_text("checkOutTime")?.filter(|t| !t.is_empty()),
            status: f.enumeration("status", AttendanceStatus::parse)?,
            remarks: f.text("remarks")?,
            marked_by: f.opt_text("markedBy")?.unwrap_or_else(|| "Admin".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_rating_skips_only_that_review() {
        let snapshot = json!({
            "1": { "id": 1, "employeeId": 7, "overallRating": 4.0, "date": "2024-03-01" },
            "2": { "id": 2, "employeeId": 7, "overallRating": "excellent" },
            "3": { "id": 3, "employeeId": 7, "overallRating": "3.5" }
        });

        let reviews: Vec<Review> = parse_snapshot(&snapshot);
        let ids: Vec<EntityId> = reviews.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(reviews[1].overall_rating, 3.5);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let snapshot = json!({ "12": { "title": "Write report" } });

        let tasks: Vec<Task> = parse_snapshot(&snapshot);
        assert_eq!(tasks.len(), 1);
        let task = &tasks[0];
        assert_eq!(task.id, 12, "numeric key stands in for a missing id");
        assert_eq!(task.employee_id, 0);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.description, "");
    }

    #[test]
    fn unknown_status_is_malformed() {
        let snapshot = json!({
            "1": { "id": 1, "status": "Archived" },
            "2": { "id": 2, "status": "Done" }
        });

        let tasks: Vec<Task> = parse_snapshot(&snapshot);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Done);
    }

    #[test]
    fn non_object_children_are_skipped() {
        let snapshot = json!({ "1": "garbage", "2": { "id": 2, "email": "a@b" } });
        let users: Vec<User> = parse_snapshot(&snapshot);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@b");
    }

    #[test]
    fn empty_collection_parses_to_nothing() {
        assert!(parse_snapshot::<User>(&Value::Null).is_empty());
    }

    #[test]
    fn legacy_message_placeholders_are_normalised() {
        let snapshot = json!({
            "5": {
                "id": 5, "senderId": "1", "receiverId": 2, "message": "hi",
                "timestamp": 1700000000000_i64, "isRead": "true",
                "messageType": "REVIEW_REPLY", "relatedReviewId": 0
            }
        });

        let messages: Vec<Message> = parse_snapshot(&snapshot);
        let message = &messages[0];
        assert_eq!(message.sender_id, 1);
        assert!(message.is_read);
        assert_eq!(message.message_type, MessageType::ReviewReply);
        assert_eq!(message.related_review_id, None);
    }

    #[test]
    fn attendance_document_round_trips_through_the_tree() {
        let attendance = Attendance {
            id: 9,
            employee_id: 3,
            date: "2024-05-02".into(),
            check_in_time: "09:05".into(),
            check_out_time: None,
            status: AttendanceStatus::HalfDay,
            remarks: String::new(),
            marked_by: "Admin".into(),
        };

        let document = attendance.to_document();
        assert_eq!(document.get("status"), Some(&json!("Half Day")));
        assert_eq!(document.get("checkInTime"), Some(&json!("09:05")));
        assert_eq!(Attendance::from_document(&document), Ok(attendance));
    }
}
