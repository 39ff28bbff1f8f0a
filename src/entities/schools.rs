use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single school in the competition.
///
/// `mail_domains` is a JSON array of domains; the first element is the
/// primary domain, the rest are aliases that deliver to the same mailboxes.
/// The domain policy fields should be treated as immutable once students
/// exist for the school: editing them silently re-keys deduplication for
/// future entries only.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "schools")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub short_name: String,
    pub mascot: String,
    pub mail_domains: Json,
    pub mail_tag: Option<String>,
    pub mail_dots: bool,
    pub allow_subdomains: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::students::Entity")]
    Students,
    #[sea_orm(has_many = "super::contests::Entity")]
    Contests,
}

impl Related<super::students::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Students.def()
    }
}

impl Related<super::contests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
