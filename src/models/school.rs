use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{ContestKind, contest_entity as contests, school_entity as schools};
use crate::services::contest_service::contest_phase;

/// Contest details safe to show publicly. Never includes per-student data.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ContestSummary {
    pub id: i64,
    pub name: String,
    pub kind: ContestKind,
    pub amount: i32,
    pub prize: String,
    pub prize_long: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    /// Derived status at the time the response was built: "upcoming",
    /// "ongoing", or "past".
    pub status: String,
}

impl ContestSummary {
    pub fn from_contest(contest: &contests::Model, now: DateTime<Utc>) -> Self {
        ContestSummary {
            id: contest.id,
            name: contest.name.clone(),
            kind: contest.kind,
            amount: contest.amount,
            prize: contest.prize.clone(),
            prize_long: contest.prize_long.clone(),
            start_at: contest.start_at,
            end_at: contest.end_at,
            status: contest_phase(contest, now).as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchoolResponse {
    pub name: String,
    pub short_name: String,
    pub slug: String,
    pub mascot: String,
    /// The ongoing contest if there is one, otherwise the next upcoming one.
    pub contest: Option<ContestSummary>,
}

impl SchoolResponse {
    pub fn from_school(school: &schools::Model, contest: Option<ContestSummary>) -> Self {
        SchoolResponse {
            name: school.name.clone(),
            short_name: school.short_name.clone(),
            slug: school.slug.clone(),
            mascot: school.mascot.clone(),
            contest,
        }
    }
}
