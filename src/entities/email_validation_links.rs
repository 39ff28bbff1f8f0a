use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single-use (but idempotently re-visitable) email validation token.
///
/// `consumed_at` records the first consumption only. Visiting the link again
/// re-applies the same downstream effect; it never re-rolls or re-mints.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "email_validation_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub student_id: i64,
    pub contest_entry_id: Option<i64>,
    /// The address this link was sent to (may differ from the student's
    /// first-seen address).
    pub email: String,
    pub token: String,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
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
        belongs_to = "super::contest_entries::Entity",
        from = "Column::ContestEntryId",
        to = "super::contest_entries::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ContestEntry,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::contest_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContestEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
