use std::sync::Arc;

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::entities::school_entity as schools;
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct SchoolService {
    pool: Arc<DatabaseConnection>,
}

impl SchoolService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    pub async fn get_by_id(&self, school_id: i64) -> AppResult<schools::Model> {
        schools::Entity::find_by_id(school_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("School {school_id} not found")))
    }

    pub async fn get_by_slug(&self, slug: &str) -> AppResult<schools::Model> {
        schools::Entity::find()
            .filter(schools::Column::Slug.eq(slug))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("School '{slug}' not found")))
    }
}
