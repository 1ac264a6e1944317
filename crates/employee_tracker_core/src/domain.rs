//! crates/employee_tracker_core/src/domain.rs
//!
//! Defines the core data structures for the application: the five entity
//! families and the small enumerations they carry. The string forms of the
//! enumerations are the ones stored in both the remote tree and the local cache.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key shared by every entity. `0` means "not yet assigned".
pub type EntityId = i64;

/// Highest value a single review score may take.
pub const MAX_SCORE: f32 = 5.0;

//=========================================================================================
// Collections
//=========================================================================================

/// One entity family's storage location: a subtree of the remote document tree
/// and a table of the local cache share the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Tasks,
    Reviews,
    Messages,
    Attendance,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Tasks,
        Collection::Reviews,
        Collection::Messages,
        Collection::Attendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tasks => "tasks",
            Collection::Reviews => "reviews",
            Collection::Messages => "messages",
            Collection::Attendance => "attendance",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Enumerations
//=========================================================================================

/// Generates `as_str`, `parse` and `Display` for a string-backed enumeration.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Parses the stored string form. Returns `None` for unknown values.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "employee")]
    Employee,
}

string_enum!(Role { Admin => "admin", Employee => "employee" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

string_enum!(Priority { Low => "Low", Medium => "Medium", High => "High", Critical => "Critical" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum TaskStatus {
    #[default]
    Pending,
    Active,
    Done,
}

string_enum!(TaskStatus { Pending => "Pending", Active => "Active", Done => "Done" });

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum MessageType {
    #[default]
    #[serde(rename = "DIRECT")]
    Direct,
    #[serde(rename = "REVIEW_REPLY")]
    ReviewReply,
    #[serde(rename = "BROADCAST")]
    Broadcast,
}

string_enum!(MessageType {
    Direct => "DIRECT",
    ReviewReply => "REVIEW_REPLY",
    Broadcast => "BROADCAST",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    #[serde(rename = "Half Day")]
    HalfDay,
    Leave,
}

string_enum!(AttendanceStatus {
    Present => "Present",
    Absent => "Absent",
    HalfDay => "Half Day",
    Leave => "Leave",
});

//=========================================================================================
// Entities
//=========================================================================================

/// An account. Admins and employees share the same record shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: EntityId,
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub joining_date: String,
    #[serde(default)]
    pub contact: String,
    #[serde(default)]
    pub profile_image: String,
}

impl User {
    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }
}

/// A unit of work assigned to one employee.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: EntityId,
    pub employee_id: EntityId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub assigned_date: String,
    #[serde(default)]
    pub assigned_by: String,
}

/// The five sub-scores of a performance review, each in `0..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ReviewScores {
    pub quality: f32,
    pub communication: f32,
    pub innovation: f32,
    pub timeliness: f32,
    pub attendance: f32,
}

impl ReviewScores {
    fn values(&self) -> [f32; 5] {
        [
            self.quality,
            self.communication,
            self.innovation,
            self.timeliness,
            self.attendance,
        ]
    }

    /// Arithmetic mean of the five sub-scores.
    pub fn overall(&self) -> f32 {
        self.values().iter().sum::<f32>() / 5.0
    }

    /// Returns the name of the first score outside `0..=5`, if any.
    pub fn out_of_range(&self) -> Option<&'static str> {
        const NAMES: [&str; 5] = ["quality", "communication", "innovation", "timeliness", "attendance"];
        self.values()
            .iter()
            .zip(NAMES)
            .find(|(value, _)| !(0.0..=MAX_SCORE).contains(*value))
            .map(|(_, name)| name)
    }
}

/// A performance review. `overall_rating` is fixed when the review is created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(default)]
    pub id: EntityId,
    pub employee_id: EntityId,
    pub date: String,
    pub quality: f32,
    pub communication: f32,
    pub innovation: f32,
    pub timeliness: f32,
    pub attendance: f32,
    pub overall_rating: f32,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub reviewed_by: String,
}

impl Review {
    /// Builds a new, unsaved review and derives its overall rating from `scores`.
    pub fn from_scores(
        employee_id: EntityId,
        date: impl Into<String>,
        scores: ReviewScores,
        remarks: impl Into<String>,
        reviewed_by: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            employee_id,
            date: date.into(),
            quality: scores.quality,
            communication: scores.communication,
            innovation: scores.innovation,
            timeliness: scores.timeliness,
            attendance: scores.attendance,
            overall_rating: scores.overall(),
            remarks: remarks.into(),
            reviewed_by: reviewed_by.into(),
        }
    }

    pub fn scores(&self) -> ReviewScores {
        ReviewScores {
            quality: self.quality,
            communication: self.communication,
            innovation: self.innovation,
            timeliness: self.timeliness,
            attendance: self.attendance,
        }
    }
}

/// A direct message between two users.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default)]
    pub id: EntityId,
    pub sender_id: EntityId,
    pub receiver_id: EntityId,
    #[serde(rename = "message")]
    pub text: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub related_review_id: Option<EntityId>,
}

impl Message {
    /// Builds a new, unread message stamped with the current time.
    pub fn compose(
        sender_id: EntityId,
        receiver_id: EntityId,
        text: impl Into<String>,
        message_type: MessageType,
        related_review_id: Option<EntityId>,
    ) -> Self {
        Self {
            id: 0,
            sender_id,
            receiver_id,
            text: text.into(),
            timestamp: Utc::now().timestamp_millis(),
            is_read: false,
            message_type,
            related_review_id,
        }
    }

    /// True when the message was exchanged between `a` and `b`, in either direction.
    pub fn is_between(&self, a: EntityId, b: EntityId) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }

    pub fn involves(&self, user_id: EntityId) -> bool {
        self.sender_id == user_id || self.receiver_id == user_id
    }
}

/// One attendance mark for one employee on one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[serde(default)]
    pub id: EntityId,
    pub employee_id: EntityId,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:mm`
    pub check_in_time: String,
    #[serde(default)]
    pub check_out_time: Option<String>,
    #[serde(default)]
    pub status: AttendanceStatus,
    #[serde(default)]
    pub remarks: String,
    #[serde(default = "default_marked_by")]
    pub marked_by: String,
}

fn default_marked_by() -> String {
    "Admin".to_string()
}

impl Default for Attendance {
    fn default() -> Self {
        Self {
            id: 0,
            employee_id: 0,
            date: String::new(),
            check_in_time: String::new(),
            check_out_time: None,
            status: AttendanceStatus::default(),
            remarks: String::new(),
            marked_by: default_marked_by(),
        }
    }
}
