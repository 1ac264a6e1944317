//! services/tracker/src/web/state.rs
//!
//! Defines the application's shared state: the family services and the
//! long-lived feeds that the read endpoints serve from.

use crate::config::Config;
use employee_tracker_core::domain::{Attendance, Message, Review, Task, User};
use employee_tracker_core::services::Services;
use employee_tracker_core::sync::{Feed, FeedSource};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub services: Services,
    pub feeds: AppFeeds,
}

impl AppState {
    /// Builds the state and opens one whole-collection feed per family.
    pub fn new(config: Arc<Config>, services: Services) -> Self {
        let feeds = AppFeeds::open(&services);
        Self {
            config,
            services,
            feeds,
        }
    }
}

//=========================================================================================
// AppFeeds (Observable Collections)
//=========================================================================================

/// One feed per family over the whole collection. They follow the remote
/// store, mirror it into the local cache and fall back to the cache on failure.
pub struct AppFeeds {
    pub users: Feed<User>,
    pub tasks: Feed<Task>,
    pub reviews: Feed<Review>,
    pub messages: Feed<Message>,
    pub attendance: Feed<Attendance>,
}

impl AppFeeds {
    pub fn open(services: &Services) -> Self {
        Self {
            users: services.employees.watch_users(),
            tasks: services.tasks.watch_all(),
            reviews: services.reviews.watch_all(),
            messages: services.messages.watch_all(),
            attendance: services.attendance.watch_all(),
        }
    }

    /// Where each feed is currently reading from.
    pub fn sources(&self) -> FeedSources {
        FeedSources {
            users: self.users.source(),
            tasks: self.tasks.source(),
            reviews: self.reviews.source(),
            messages: self.messages.source(),
            attendance: self.attendance.source(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FeedSources {
    pub users: FeedSource,
    pub tasks: FeedSource,
    pub reviews: FeedSource,
    pub messages: FeedSource,
    pub attendance: FeedSource,
}
