pub mod analytics;
pub mod domain;
pub mod live;
pub mod ports;
pub mod records;
pub mod remote;
pub mod services;
pub mod sync;

pub use domain::{
    Attendance, AttendanceStatus, Collection, EntityId, Message, MessageType, Priority, Review, ReviewScores, Role,
    Task, TaskStatus, User,
};
pub use ports::{Document, DocumentStore, LocalCache, PortError, PortResult, RecordStream, SnapshotStream};
pub use records::{parse_snapshot, RemoteRecord};
pub use remote::RemoteRepository;
pub use services::{AttendanceService, EmployeeService, MessageService, ReviewService, Services, TaskService};
pub use sync::{spawn_feed, CachedRecord, Feed, FeedSource, FeedState, WriteOutcome, WriteThrough};
