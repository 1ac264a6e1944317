//! crates/employee_tracker_core/src/analytics.rs
//!
//! Dashboard figures derived from full record lists. Nothing here is cached:
//! callers recompute from the latest feed state every time it changes.

use crate::domain::{Attendance, AttendanceStatus, EntityId, Message, Review, Task, TaskStatus, User};
use serde::Serialize;
use std::collections::HashSet;

/// Length of the "top performers" board.
pub const TOP_PERFORMERS: usize = 3;

/// `done * 100 / total`, truncated. `0` for an empty list.
pub fn completion_rate(tasks: &[Task]) -> u32 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
    (done * 100 / tasks.len()) as u32
}

/// Mean `overall_rating` of the given reviews. `0.0` for an empty list.
pub fn average_rating<'a>(reviews: impl IntoIterator<Item = &'a Review>) -> f32 {
    let (sum, count) = reviews
        .into_iter()
        .fold((0.0f32, 0usize), |(sum, count), r| (sum + r.overall_rating, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

/// Messages addressed to `user_id` that have not been read.
pub fn unread_count(messages: &[Message], user_id: EntityId) -> usize {
    messages
        .iter()
        .filter(|m| m.receiver_id == user_id && !m.is_read)
        .count()
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Performer {
    pub employee_id: EntityId,
    pub average_rating: f32,
    pub review_count: usize,
}

/// Groups reviews by employee, ranks the groups by mean rating (highest first)
/// and keeps the first `limit`. Equal means keep the order in which each
/// employee first appears in `reviews`.
pub fn leaderboard(reviews: &[Review], limit: usize) -> Vec<Performer> {
    let mut groups: Vec<(EntityId, f32, usize)> = Vec::new();
    for review in reviews {
        match groups.iter_mut().find(|(id, _, _)| *id == review.employee_id) {
            Some((_, sum, count)) => {
                *sum += review.overall_rating;
                *count += 1;
            }
            None => groups.push((review.employee_id, review.overall_rating, 1)),
        }
    }

    let mut board: Vec<Performer> = groups
        .into_iter()
        .map(|(employee_id, sum, count)| Performer {
            employee_id,
            average_rating: sum / count as f32,
            review_count: count,
        })
        .collect();
    // `sort_by` is stable, so ties stay in first-appearance order.
    board.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating));
    board.truncate(limit);
    board
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TaskCounts {
    pub total: usize,
    pub pending: usize,
    pub active: usize,
    pub done: usize,
}

impl TaskCounts {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        tasks.iter().fold(
            Self {
                total: tasks.len(),
                ..Self::default()
            },
            |mut counts, task| {
                match task.status {
                    TaskStatus::Pending => counts.pending += 1,
                    TaskStatus::Active => counts.active += 1,
                    TaskStatus::Done => counts.done += 1,
                }
                counts
            },
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub half_day: usize,
    pub leave: usize,
}

impl AttendanceSummary {
    pub fn from_marks(marks: &[Attendance]) -> Self {
        marks.iter().fold(Self::default(), |mut summary, mark| {
            match mark.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Absent => summary.absent += 1,
                AttendanceStatus::HalfDay => summary.half_day += 1,
                AttendanceStatus::Leave => summary.leave += 1,
            }
            summary
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DepartmentCount {
    pub department: String,
    pub employees: usize,
}

/// Employee head-count per department, in first-appearance order.
pub fn department_headcount(users: &[User]) -> Vec<DepartmentCount> {
    let mut counts: Vec<DepartmentCount> = Vec::new();
    for user in users.iter().filter(|u| u.is_employee()) {
        match counts.iter_mut().find(|c| c.department == user.department) {
            Some(count) => count.employees += 1,
            None => counts.push(DepartmentCount {
                department: user.department.clone(),
                employees: 1,
            }),
        }
    }
    counts
}

/// Number of distinct employees with at least one `Active` task.
pub fn active_employee_count(tasks: &[Task]) -> usize {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Active)
        .map(|t| t.employee_id)
        .collect::<HashSet<_>>()
        .len()
}

//=========================================================================================
// Dashboards
//=========================================================================================

/// The admin home screen's figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct AdminOverview {
    pub employee_count: usize,
    pub active_employees: usize,
    pub departments: Vec<DepartmentCount>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub pending_tasks: usize,
    pub completion_rate: u32,
    pub average_rating: f32,
    pub top_performers: Vec<Performer>,
    pub unread_messages: usize,
}

impl AdminOverview {
    pub fn compute(admin_id: EntityId, employees: &[User], tasks: &[Task], reviews: &[Review], messages: &[Message]) -> Self {
        let counts = TaskCounts::from_tasks(tasks);
        Self {
            employee_count: employees.iter().filter(|u| u.is_employee()).count(),
            active_employees: active_employee_count(tasks),
            departments: department_headcount(employees),
            total_tasks: counts.total,
            completed_tasks: counts.done,
            pending_tasks: counts.total - counts.done,
            completion_rate: completion_rate(tasks),
            average_rating: average_rating(reviews),
            top_performers: leaderboard(reviews, TOP_PERFORMERS),
            unread_messages: unread_count(messages, admin_id),
        }
    }
}

/// One employee's home screen figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EmployeeOverview {
    pub employee_id: EntityId,
    pub tasks: TaskCounts,
    pub completion_rate: u32,
    pub average_rating: f32,
    pub review_count: usize,
    pub attendance: AttendanceSummary,
    pub unread_messages: usize,
}

impl EmployeeOverview {
    /// Filters each list down to `employee_id` before aggregating.
    pub fn compute(
        employee_id: EntityId,
        tasks: &[Task],
        reviews: &[Review],
        attendance: &[Attendance],
        messages: &[Message],
    ) -> Self {
        let own_tasks: Vec<Task> = tasks.iter().filter(|t| t.employee_id == employee_id).cloned().collect();
        let own_reviews: Vec<&Review> = reviews.iter().filter(|r| r.employee_id == employee_id).collect();
        let own_marks: Vec<Attendance> = attendance
            .iter()
            .filter(|a| a.employee_id == employee_id)
            .cloned()
            .collect();

        Self {
            employee_id,
            tasks: TaskCounts::from_tasks(&own_tasks),
            completion_rate: completion_rate(&own_tasks),
            average_rating: average_rating(own_reviews.iter().copied()),
            review_count: own_reviews.len(),
            attendance: AttendanceSummary::from_marks(&own_marks),
            unread_messages: unread_count(messages, employee_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn review(employee_id: EntityId, overall_rating: f32) -> Review {
        Review {
            employee_id,
            overall_rating,
            ..Review::default()
        }
    }

    fn task(employee_id: EntityId, status: TaskStatus) -> Task {
        Task {
            employee_id,
            title: "work".to_string(),
            status,
            ..Task::default()
        }
    }

    fn unread_to(receiver_id: EntityId) -> Message {
        Message {
            sender_id: 99,
            receiver_id,
            ..Message::default()
        }
    }

    #[test]
    fn average_rating_is_the_mean_of_overall_ratings() {
        let reviews = vec![review(7, 4.0), review(7, 5.0), review(7, 3.0)];
        assert_eq!(average_rating(&reviews), 4.0);
    }

    #[test]
    fn average_rating_of_nothing_is_zero() {
        assert_eq!(average_rating(&Vec::<Review>::new()), 0.0);
    }

    #[test]
    fn completion_rate_truncates() {
        let mut tasks: Vec<Task> = (0..4).map(|_| task(1, TaskStatus::Done)).collect();
        tasks.extend((0..6).map(|_| task(1, TaskStatus::Pending)));
        assert_eq!(completion_rate(&tasks), 40);

        let thirds = vec![task(1, TaskStatus::Done), task(1, TaskStatus::Active), task(1, TaskStatus::Pending)];
        assert_eq!(completion_rate(&thirds), 33);
    }

    #[test]
    fn completion_rate_of_no_tasks_is_zero() {
        assert_eq!(completion_rate(&[]), 0);
    }

    #[test]
    fn marking_two_of_five_unread_leaves_three() {
        let mut messages: Vec<Message> = (0..5).map(|_| unread_to(1)).collect();
        messages.push(unread_to(2));
        assert_eq!(unread_count(&messages, 1), 5);

        messages[0].is_read = true;
        assert_eq!(unread_count(&messages, 1), 4);
        messages[3].is_read = true;
        assert_eq!(unread_count(&messages, 1), 3);
    }

    #[test]
    fn leaderboard_ranks_by_mean_and_keeps_top_three() {
        let reviews = vec![review(1, 4.8), review(2, 4.9), review(3, 3.0), review(4, 4.95)];
        let ids: Vec<EntityId> = leaderboard(&reviews, TOP_PERFORMERS).iter().map(|p| p.employee_id).collect();
        assert_eq!(ids, vec![4, 2, 1]);
    }

    #[test]
    fn leaderboard_averages_each_employee() {
        let reviews = vec![review(1, 5.0), review(2, 4.0), review(1, 3.0)];
        let board = leaderboard(&reviews, TOP_PERFORMERS);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0], Performer { employee_id: 1, average_rating: 4.0, review_count: 2 });
        assert_eq!(board[1].employee_id, 2);
    }

    #[test]
    fn leaderboard_ties_keep_first_appearance_order() {
        let reviews = vec![review(5, 4.0), review(3, 4.5), review(9, 4.0), review(3, 3.5)];
        let ids: Vec<EntityId> = leaderboard(&reviews, 10).iter().map(|p| p.employee_id).collect();
        assert_eq!(ids, vec![5, 3, 9]);
    }

    #[test]
    fn leaderboard_of_no_reviews_is_empty() {
        assert!(leaderboard(&[], TOP_PERFORMERS).is_empty());
    }

    #[test]
    fn admin_overview_combines_the_lists() {
        let employees = vec![
            User { id: 1, role: Role::Employee, department: "Eng".into(), ..User::default() },
            User { id: 2, role: Role::Employee, department: "Ops".into(), ..User::default() },
            User { id: 9, role: Role::Admin, ..User::default() },
        ];
        let tasks = vec![task(1, TaskStatus::Done), task(1, TaskStatus::Active), task(2, TaskStatus::Active), task(2, TaskStatus::Pending)];
        let reviews = vec![review(1, 4.0), review(2, 2.0)];
        let messages = vec![unread_to(9), unread_to(1)];

        let overview = AdminOverview::compute(9, &employees, &tasks, &reviews, &messages);
        assert_eq!(overview.employee_count, 2);
        assert_eq!(overview.active_employees, 2);
        assert_eq!(overview.total_tasks, 4);
        assert_eq!(overview.completed_tasks, 1);
        assert_eq!(overview.pending_tasks, 3);
        assert_eq!(overview.completion_rate, 25);
        assert_eq!(overview.average_rating, 3.0);
        assert_eq!(overview.top_performers[0].employee_id, 1);
        assert_eq!(overview.unread_messages, 1);
        let departments: Vec<(&str, usize)> =
            overview.departments.iter().map(|d| (d.department.as_str(), d.employees)).collect();
        assert_eq!(departments, vec![("Eng", 1), ("Ops", 1)]);
    }

    #[test]
    fn employee_overview_only_counts_own_records() {
        let tasks = vec![task(1, TaskStatus::Done), task(1, TaskStatus::Done), task(2, TaskStatus::Done)];
        let reviews = vec![review(1, 5.0), review(2, 1.0)];
        let attendance = vec![
            Attendance { employee_id: 1, status: AttendanceStatus::Present, ..Attendance::default() },
            Attendance { employee_id: 1, status: AttendanceStatus::HalfDay, ..Attendance::default() },
            Attendance { employee_id: 2, status: AttendanceStatus::Absent, ..Attendance::default() },
        ];

        let overview = EmployeeOverview::compute(1, &tasks, &reviews, &attendance, &[]);
        assert_eq!(overview.tasks, TaskCounts { total: 2, pending: 0, active: 0, done: 2 });
        assert_eq!(overview.completion_rate, 100);
        assert_eq!(overview.average_rating, 5.0);
        assert_eq!(overview.review_count, 1);
        assert_eq!(overview.attendance, AttendanceSummary { present: 1, absent: 0, half_day: 1, leave: 0 });
        assert_eq!(overview.unread_messages, 0);
    }
}
