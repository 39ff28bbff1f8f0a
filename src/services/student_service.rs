use std::sync::Arc;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set,
};

use crate::database::is_unique_violation;
use crate::entities::{school_entity as schools, student_entity as students};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct StudentService {
    pool: Arc<DatabaseConnection>,
}

impl StudentService {
    pub fn new(pool: impl Into<Arc<DatabaseConnection>>) -> Self {
        Self { pool: pool.into() }
    }

    /// Get or create a student by normalized-email hash.
    ///
    /// `hash` must come from [`crate::utils::hash_email`] under the school's
    /// policy; `email` is only stored as the first-seen address and plays no
    /// part in identity. Two concurrent first checks race on the
    /// (school_id, hash) unique index; the loser reads the committed row.
    pub async fn get_or_create_student(
        &self,
        school: &schools::Model,
        hash: &str,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> AppResult<students::Model> {
        if let Some(existing) = find_by_hash(&*self.pool, school.id, hash).await? {
            return Ok(existing);
        }

        let insert = students::ActiveModel {
            school_id: Set(school.id),
            email: Set(email.to_string()),
            hash: Set(hash.to_string()),
            first_name: Set(first_name.to_string()),
            last_name: Set(last_name.to_string()),
            other_emails: Set(serde_json::json!([])),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await;

        match insert {
            Ok(student) => Ok(student),
            Err(err) if is_unique_violation(&err) => find_by_hash(&*self.pool, school.id, hash)
                .await?
                .ok_or_else(|| {
                    AppError::InternalError("Student disappeared after insert conflict".to_string())
                }),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_by_id(&self, student_id: i64) -> AppResult<students::Model> {
        students::Entity::find_by_id(student_id)
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Student {student_id} not found")))
    }
}

pub(crate) async fn find_by_hash<C: ConnectionTrait>(
    conn: &C,
    school_id: i64,
    hash: &str,
) -> Result<Option<students::Model>, DbErr> {
    students::Entity::find()
        .filter(students::Column::SchoolId.eq(school_id))
        .filter(students::Column::Hash.eq(hash))
        .one(conn)
        .await
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sea_orm::{DatabaseBackend, MockDatabase};

    pub fn test_school() -> schools::Model {
        schools::Model {
            id: 1,
            name: "Test University".to_string(),
            slug: "test-u".to_string(),
            short_name: "Test U".to_string(),
            mascot: "Crabs".to_string(),
            mail_domains: serde_json::json!(["test.edu"]),
            mail_tag: Some("+".to_string()),
            mail_dots: true,
            allow_subdomains: false,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn test_student(validated: bool) -> students::Model {
        students::Model {
            id: 7,
            school_id: 1,
            email: "alice@test.edu".to_string(),
            hash: "a".repeat(64),
            first_name: "Alice".to_string(),
            last_name: "Example".to_string(),
            other_emails: serde_json::json!([]),
            email_validated_at: validated
                .then(|| Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()),
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_get_or_create_returns_existing_student() {
        let existing = test_student(false);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection();
        let service = StudentService::new(db);

        let student = service
            .get_or_create_student(&test_school(), &existing.hash, "alice@test.edu", "Alice", "Example")
            .await
            .expect("existing student is returned");
        assert_eq!(student.id, existing.id);
    }
}
