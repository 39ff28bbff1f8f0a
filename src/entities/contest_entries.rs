use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A roll of 0 is a win; any other value is a loss.
pub const WINNING_ROLL: i32 = 0;
/// Conventional roll recorded for guaranteed losses (late entries and
/// contests with no entry-time winner).
pub const LOSING_ROLL: i32 = 1;

/// One student's entry into one contest.
///
/// Unique per (student_id, contest_id); the database constraint is what
/// stops a student from re-rolling the dice by resubmitting the form.
///
/// `request_token` is fixed at creation and forms the opaque suffix of the
/// vendor creation request id, so a retried mint always presents the same id.
/// `creation_request_id` is the one-way "prize issued" latch: empty until a
/// gift card has actually been minted, written at most once.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "contest_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub contest_id: i64,
    pub roll: i32,
    pub amount_won: i32,
    pub request_token: String,
    pub creation_request_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_winner(&self) -> bool {
        self.roll == WINNING_ROLL
    }

    /// Whether the prize has actually been minted at the vendor.
    pub fn has_issued(&self) -> bool {
        self.creation_request_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::students::Entity",
        from = "Column::StudentId",
        to = "super::students::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Student,
    #[sea_orm(
        belongs_to = "super::contests::Entity",
        from = "Column::ContestId",
        to = "super::contests::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Contest,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::contests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contest.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
