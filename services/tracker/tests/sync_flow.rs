//! End-to-end behaviour of the family services over an in-memory remote store
//! and an in-memory SQLite cache.

use employee_tracker_core::domain::{Collection, EntityId, MessageType, ReviewScores, Role, Task, TaskStatus, User};
use employee_tracker_core::ports::{LocalCache, PortError};
use employee_tracker_core::remote::RemoteRepository;
use employee_tracker_core::services::Services;
use employee_tracker_core::sync::{Feed, FeedSource, FeedState};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracker_lib::adapters::{MemoryStore, SqliteCache};

async fn setup() -> (MemoryStore, Arc<SqliteCache>, Services) {
    let cache = SqliteCache::connect("sqlite::memory:", 1).await.unwrap();
    cache.prepare_schema().await.unwrap();
    let cache = Arc::new(cache);
    let store = MemoryStore::new();
    let remote = RemoteRepository::new(Arc::new(store.clone()));
    let services = Services::new(remote, cache.clone());
    (store, cache, services)
}

fn employee(email: &str, department: &str) -> User {
    User {
        email: email.to_string(),
        password: "pw".to_string(),
        name: email.split('@').next().unwrap_or_default().to_string(),
        role: Role::Employee,
        department: department.to_string(),
        ..User::default()
    }
}

fn task_for(employee_id: EntityId, title: &str) -> Task {
    Task {
        employee_id,
        title: title.to_string(),
        ..Task::default()
    }
}

/// Waits until the feed publishes a state matching `done`.
async fn wait_until<T: Clone>(feed: &mut Feed<T>, done: impl Fn(&FeedState<T>) -> bool) -> FeedState<T> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let state = feed.snapshot();
            if done(&state) {
                return state;
            }
            assert!(feed.changed().await, "feed stopped before reaching the expected state");
        }
    })
    .await
    .expect("timed out waiting for the feed")
}

/// Polls `probe` until it yields a value.
async fn eventually<T, F, Fut>(mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..250 {
        if let Some(value) = probe().await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition was never met");
}

#[tokio::test]
async fn remote_snapshots_are_published_and_mirrored_into_the_cache() {
    let (_store, cache, services) = setup().await;
    let mut users = services.employees.watch_users();

    let outcome = services.employees.add_employee(employee("asha@corp", "Eng")).await.unwrap();
    assert!(!outcome.is_local_only());
    let id = outcome.record().id;
    assert_ne!(id, 0);

    let state = wait_until(&mut users, |s| s.records.iter().any(|u| u.id == id)).await;
    assert_eq!(state.source, FeedSource::Remote);
    assert!(state.last_error.is_none());

    let c = &cache;
    let mirrored = eventually(move || async move { c.get_user(id).await.unwrap() }).await;
    assert_eq!(mirrored.email, "asha@corp");
    assert_eq!(mirrored.department, "Eng");
}

#[tokio::test]
async fn employee_feed_only_lists_employees() {
    let (_store, _cache, services) = setup().await;
    let mut employees = services.employees.watch_employees();

    let admin = User {
        role: Role::Admin,
        ..employee("boss@corp", "Management")
    };
    services.employees.add_employee(admin).await.unwrap();
    let staff = services.employees.add_employee(employee("ravi@corp", "Ops")).await.unwrap();
    let staff_id = staff.record().id;

    let state = wait_until(&mut employees, |s| !s.records.is_empty()).await;
    let ids: Vec<EntityId> = state.records.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![staff_id]);
}

#[tokio::test]
async fn losing_the_remote_store_switches_feeds_to_the_cache() {
    let (store, cache, services) = setup().await;
    let mut users = services.employees.watch_users();
    let mut tasks = services.tasks.watch_all();

    let owner = services
        .employees
        .add_employee(employee("asha@corp", "Eng"))
        .await
        .unwrap()
        .into_record()
        .id;
    wait_until(&mut users, |s| s.records.iter().any(|u| u.id == owner)).await;
    let c = &cache;
    eventually(move || async move { c.get_user(owner).await.unwrap() }).await;

    let first = services.tasks.add_task(task_for(owner, "Write report")).await.unwrap();
    let first_id = first.record().id;
    wait_until(&mut tasks, |s| s.records.iter().any(|t| t.id == first_id)).await;
    eventually(move || async move { c.get_task(first_id).await.unwrap() }).await;

    store.disconnect();
    let state = wait_until(&mut tasks, |s| s.source == FeedSource::Local).await;
    assert!(state.last_error.is_some());
    assert!(state.records.iter().any(|t| t.id == first_id));

    // Writes now land in the cache only, and the fallback feed follows them.
    let second = services.tasks.add_task(task_for(owner, "Review budget")).await.unwrap();
    assert!(second.is_local_only());
    let second_id = second.record().id;
    assert_ne!(second_id, 0);
    let state = wait_until(&mut tasks, |s| s.records.iter().any(|t| t.id == second_id)).await;
    assert_eq!(state.source, FeedSource::Local);
    assert_eq!(state.records.len(), 2);
}

#[tokio::test]
async fn malformed_remote_records_are_skipped() {
    let (store, _cache, services) = setup().await;
    store.put_raw(
        Collection::Tasks,
        "5",
        json!({"id": 5, "employeeId": 1, "title": "Ship it", "status": "Pending"}),
    );
    store.put_raw(
        Collection::Tasks,
        "6",
        json!({"id": 6, "employeeId": 1, "title": "Broken", "status": "Blocked"}),
    );

    let mut tasks = services.tasks.watch_all();
    let state = wait_until(&mut tasks, |s| s.source == FeedSource::Remote).await;
    let ids: Vec<EntityId> = state.records.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![5]);
}

#[tokio::test]
async fn offline_writes_are_kept_locally() {
    let (store, cache, services) = setup().await;
    let sender = cache.upsert_user(&employee("asha@corp", "Eng")).await.unwrap();
    let receiver = cache.upsert_user(&employee("ravi@corp", "Ops")).await.unwrap();
    store.disconnect();

    let sent = services
        .messages
        .send(sender, receiver, "Standup moved to 10", MessageType::Direct, None)
        .await
        .unwrap();
    assert!(sent.is_local_only());
    let message_id = sent.record().id;
    assert_eq!(cache.unread_count(receiver).await.unwrap(), 1);

    let read = services.messages.mark_read(message_id).await.unwrap();
    assert!(read.is_local_only());
    assert!(read.record().is_read);
    assert_eq!(cache.unread_count(receiver).await.unwrap(), 0);

    let removed = services.messages.delete_message(message_id).await.unwrap();
    assert!(removed.is_local_only());
    assert!(cache.get_message(message_id).await.unwrap().is_none());
}

#[tokio::test]
async fn conversation_is_oldest_first_and_can_be_marked_read() {
    let (_store, cache, services) = setup().await;
    let mut users = services.employees.watch_users();
    let mut all_messages = services.messages.watch_all();

    let asha = services.employees.add_employee(employee("asha@corp", "Eng")).await.unwrap().into_record().id;
    let ravi = services.employees.add_employee(employee("ravi@corp", "Ops")).await.unwrap().into_record().id;
    wait_until(&mut users, |s| s.records.len() == 2).await;
    let c = &cache;
    eventually(move || async move { (c.list_users().await.unwrap().len() == 2).then_some(()) }).await;

    services.messages.send(asha, ravi, "first", MessageType::Direct, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    services.messages.send(asha, ravi, "second", MessageType::Direct, None).await.unwrap();
    wait_until(&mut all_messages, |s| s.records.len() == 2).await;
    eventually(move || async move { (c.unread_count(ravi).await.unwrap() == 2).then_some(()) }).await;

    let mut thread = services.messages.watch_conversation(ravi, asha);
    let state = wait_until(&mut thread, |s| s.records.len() == 2).await;
    let texts: Vec<&str> = state.records.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);

    let outcomes = services.messages.mark_conversation_read(ravi, asha).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| !o.is_local_only() && o.record().is_read));
    wait_until(&mut thread, |s| s.records.iter().all(|m| m.is_read)).await;

    assert_eq!(services.messages.partners(ravi).await.unwrap(), vec![asha]);
}

#[tokio::test]
async fn login_checks_the_cache_then_the_remote_users() {
    let (store, cache, services) = setup().await;
    assert!(cache.seed_admin("admin@corp", "admin123").await.unwrap());

    let admin = services.employees.login("admin@corp", "admin123").await.unwrap();
    assert_eq!(admin.map(|u| u.role), Some(Role::Admin));
    assert!(services.employees.login("admin@corp", "nope").await.unwrap().is_none());

    store.put_raw(
        Collection::Users,
        "77",
        json!({"id": 77, "email": "remote@corp", "password": "pw", "name": "Remote", "role": "employee"}),
    );
    let remote_only = services.employees.login("remote@corp", "pw").await.unwrap();
    assert_eq!(remote_only.map(|u| u.id), Some(77));

    // An unreachable remote store is not an error, just no match.
    store.disconnect();
    assert!(services.employees.login("remote@corp", "pw").await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_writes_are_rejected_before_reaching_either_store() {
    let (_store, cache, services) = setup().await;

    let empty_title = services.tasks.add_task(task_for(1, "  ")).await;
    assert!(matches!(empty_title, Err(PortError::InvalidInput(_))));

    let no_email = services.employees.add_employee(employee("", "Eng")).await;
    assert!(matches!(no_email, Err(PortError::InvalidInput(_))));

    let scores = ReviewScores {
        quality: 6.0,
        ..ReviewScores::default()
    };
    let out_of_range = services.reviews.submit_review(1, "2024-05-01", scores, "", "Admin").await;
    assert!(matches!(out_of_range, Err(PortError::InvalidInput(_))));

    let unknown = services.tasks.update_status(404, TaskStatus::Done).await;
    assert!(matches!(unknown, Err(PortError::NotFound(_))));

    let no_id = services.tasks.update_task(task_for(1, "Orphan")).await;
    assert!(matches!(no_id, Err(PortError::InvalidInput(_))));

    assert!(cache.list_tasks().await.unwrap().is_empty());
}

#[tokio::test]
async fn submitted_reviews_carry_the_mean_of_their_scores() {
    let (_store, _cache, services) = setup().await;
    let scores = ReviewScores {
        quality: 5.0,
        communication: 4.0,
        innovation: 3.0,
        timeliness: 4.0,
        attendance: 4.0,
    };
    let outcome = services
        .reviews
        .submit_review(1, "2024-05-01", scores, "Solid quarter", "Admin")
        .await
        .unwrap();
    let review = outcome.into_record();
    assert!((review.overall_rating - 4.0).abs() < 1e-6);
    assert_eq!(review.remarks, "Solid quarter");
}

#[tokio::test]
async fn remote_deletes_disappear_from_the_feed() {
    let (_store, _cache, services) = setup().await;
    let mut users = services.employees.watch_users();
    let id = services.employees.add_employee(employee("asha@corp", "Eng")).await.unwrap().into_record().id;
    wait_until(&mut users, |s| s.records.len() == 1).await;

    let outcome = services.employees.delete_employee(id).await.unwrap();
    assert_eq!(outcome.into_record(), id);
    wait_until(&mut users, |s| s.records.is_empty()).await;
}

#[tokio::test]
async fn children_rejected_before_their_owner_is_cached_are_mirrored_later() {
    let (store, cache, services) = setup().await;
    store.put_raw(
        Collection::Tasks,
        "31",
        json!({"id": 31, "employeeId": 42, "title": "Onboarding", "status": "Pending"}),
    );
    let mut tasks = services.tasks.watch_all();
    wait_until(&mut tasks, |s| s.source == FeedSource::Remote && s.records.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.get_task(31).await.unwrap().is_none());

    store.put_raw(
        Collection::Users,
        "42",
        json!({"id": 42, "email": "late@corp", "password": "pw", "name": "Late", "role": "employee"}),
    );
    let _users = services.employees.watch_users();

    let c = &cache;
    let task = eventually(move || async move { c.get_task(31).await.unwrap() }).await;
    assert_eq!(task.employee_id, 42);
    assert_eq!(task.title, "Onboarding");
}

#[tokio::test]
async fn dropped_feeds_stop_mirroring() {
    let (_store, cache, services) = setup().await;
    let mut users = services.employees.watch_users();
    let first = services.employees.add_employee(employee("asha@corp", "Eng")).await.unwrap().into_record().id;
    wait_until(&mut users, |s| s.records.iter().any(|u| u.id == first)).await;
    let c = &cache;
    eventually(move || async move { c.get_user(first).await.unwrap() }).await;

    drop(users);
    let second = services.employees.add_employee(employee("ravi@corp", "Ops")).await.unwrap().into_record().id;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(cache.get_user(second).await.unwrap().is_none());
}

#[tokio::test]
async fn closed_feeds_stop_publishing() {
    let (_store, _cache, services) = setup().await;
    let mut users = services.employees.watch_users();
    wait_until(&mut users, |s| s.source == FeedSource::Remote).await;

    users.close();
    tokio::time::timeout(Duration::from_secs(5), async {
        while users.changed().await {}
    })
    .await
    .expect("closed feed kept publishing");
}

#[tokio::test]
async fn feeds_opened_while_offline_serve_the_cache() {
    let (store, cache, services) = setup().await;
    let owner = cache.upsert_user(&employee("asha@corp", "Eng")).await.unwrap();
    let task_id = cache.upsert_task(&task_for(owner, "Write report")).await.unwrap();
    store.disconnect();

    let mut tasks = services.tasks.watch_all();
    let state = wait_until(&mut tasks, |s| s.source == FeedSource::Local).await;
    let cause = state.last_error.expect("fallback carries the remote failure");
    assert!(cause.contains("offline"));
    let ids: Vec<EntityId> = state.records.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![task_id]);
}

#[tokio::test]
async fn review_feed_is_newest_first() {
    let (store, _cache, services) = setup().await;
    for (key, date) in [("1", "2024-01-15"), ("2", "2024-03-01"), ("3", "2023-12-31")] {
        store.put_raw(
            Collection::Reviews,
            key,
            json!({"id": key.parse::<i64>().unwrap(), "employeeId": 1, "date": date}),
        );
    }

    let mut reviews = services.reviews.watch_all();
    let state = wait_until(&mut reviews, |s| s.source == FeedSource::Remote && s.records.len() == 3).await;
    let dates: Vec<&str> = state.records.iter().map(|r| r.date.as_str()).collect();
    assert_eq!(dates, vec!["2024-03-01", "2024-01-15", "2023-12-31"]);
}

#[tokio::test]
async fn remote_task_feed_is_ordered_by_id_like_the_cache() {
    let (store, _cache, services) = setup().await;
    store.put_raw(Collection::Tasks, "10", json!({"id": 10, "employeeId": 1, "title": "Ten"}));
    store.put_raw(Collection::Tasks, "9", json!({"id": 9, "employeeId": 1, "title": "Nine"}));

    let mut tasks = services.tasks.watch_all();
    let state = wait_until(&mut tasks, |s| s.source == FeedSource::Remote && s.records.len() == 2).await;
    let ids: Vec<EntityId> = state.records.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![9, 10]);
}
