use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single student in the competition.
///
/// Identified within a school by `hash`, the SHA-256 of the normalized email
/// address (unique per (school_id, hash)). `email` is the first address the
/// student ever checked with; `other_emails` accumulates any further
/// addresses they validate later.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "students")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub school_id: i64,
    pub email: String,
    pub hash: String,
    pub first_name: String,
    pub last_name: String,
    pub other_emails: Json,
    pub email_validated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Whether any address owned by this student has been proven controlled.
    pub fn is_validated(&self) -> bool {
        self.email_validated_at.is_some()
    }

    pub fn other_emails_vec(&self) -> Vec<String> {
        serde_json::from_value(self.other_emails.clone()).unwrap_or_default()
    }
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
    #[sea_orm(has_many = "super::email_validation_links::Entity")]
    EmailValidationLinks,
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

impl Related<super::email_validation_links::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmailValidationLinks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
