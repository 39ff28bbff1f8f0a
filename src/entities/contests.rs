use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a contest awards its prize.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum ContestKind {
    /// Every entrant wins `amount`. Must have `in_n == 1`.
    #[sea_orm(string_value = "giveaway")]
    Giveaway,
    /// 1-in-`in_n` entrants win `amount`, decided at entry time.
    #[sea_orm(string_value = "dice_roll")]
    DiceRoll,
    /// One winner picked by an administrator after the contest ends; no
    /// entrant wins at entry time.
    #[sea_orm(string_value = "single_winner")]
    SingleWinner,
    /// No prize at all. Must have `amount == 0`.
    #[sea_orm(string_value = "no_prize")]
    NoPrize,
}

impl std::fmt::Display for ContestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContestKind::Giveaway => write!(f, "giveaway"),
            ContestKind::DiceRoll => write!(f, "dice_roll"),
            ContestKind::SingleWinner => write!(f, "single_winner"),
            ContestKind::NoPrize => write!(f, "no_prize"),
        }
    }
}

/// A single contest run by a school.
///
/// A contest has no stored status: it is upcoming, ongoing, or past purely as
/// a function of the clock against the half-open interval
/// `[start_at, end_at)`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "contests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub school_id: i64,
    pub name: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub kind: ContestKind,
    /// 1 in `in_n` entrants win. Always 1 for giveaways.
    pub in_n: i32,
    /// Prize value in whole dollars. 0 when there is nothing to mint.
    pub amount: i32,
    pub prize: String,
    pub prize_long: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::schools::Entity",
        from = "Column::SchoolId",
        to = "super::schools::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    School,
    #[sea_orm(has_many = "super::contest_entries::Entity")]
    ContestEntries,
}

impl Related<super::schools::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::School.def()
    }
}

impl Related<super::contest_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContestEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
