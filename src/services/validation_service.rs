use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, TransactionTrait,
};
use serde_json::json;
use std::sync::Arc;

use crate::entities::{
    contest_entry_entity as entries, email_validation_link_entity as links,
    school_entity as schools, student_entity as students,
};
use crate::error::{AppError, AppResult};
use crate::external::EmailSender;
use crate::utils::make_token;

/// 12 characters over a 62-symbol alphabet: enough entropy that guessing a
/// live token is not a realistic attack.
const VALIDATION_TOKEN_LENGTH: usize = 12;

/// Issues and consumes email validation links.
///
/// A link is what stands between a database-confirmed winner and their claim
/// code: the code is never shown or emailed until the student proves control
/// of a school address by visiting one of these URLs.
#[derive(Clone)]
pub struct ValidationService {
    pool: Arc<DatabaseConnection>,
    mailer: Arc<dyn EmailSender>,
    public_base_url: String,
    validation_template_id: String,
}

impl ValidationService {
    pub fn new(
        pool: DatabaseConnection,
        mailer: Arc<dyn EmailSender>,
        public_base_url: String,
        validation_template_id: String,
    ) -> Self {
        Self {
            pool: Arc::new(pool),
            mailer,
            public_base_url,
            validation_template_id,
        }
    }

    /// Create a validation link for `email` and dispatch the validation
    /// message.
    ///
    /// Always called on a check submission, even for students who validated
    /// long ago: the claim code lives behind the link, never on the page
    /// that handled the form POST.
    ///
    /// A dispatch failure is logged and the persisted link returned anyway;
    /// the student can resubmit the check to get a fresh one.
    pub async fn send_validation_link(
        &self,
        school: &schools::Model,
        student: &students::Model,
        email: &str,
        contest_entry: Option<&entries::Model>,
    ) -> AppResult<links::Model> {
        let link = links::ActiveModel {
            student_id: Set(student.id),
            contest_entry_id: Set(contest_entry.map(|entry| entry.id)),
            email: Set(email.to_string()),
            token: Set(make_token(VALIDATION_TOKEN_LENGTH)),
            ..Default::default()
        }
        .insert(&*self.pool)
        .await?;

        let link_url = format!(
            "{}/{}/validate/{}",
            self.public_base_url.trim_end_matches('/'),
            school.slug,
            link.token
        );
        let button_text = match contest_entry {
            Some(entry) if entry.is_winner() => {
                format!("Get my ${} gift card", entry.amount_won)
            }
            _ => "Validate my email".to_string(),
        };

        if let Err(err) = self
            .mailer
            .send_template(
                email,
                &self.validation_template_id,
                json!({
                    "first_name": student.first_name,
                    "school_name": school.name,
                    "link_url": link_url,
                    "button_text": button_text,
                }),
            )
            .await
        {
            log::error!("Failed to send email validation link to {email}: {err}");
        }

        Ok(link)
    }

    pub async fn find_link_by_token(&self, token: &str) -> AppResult<links::Model> {
        links::Entity::find()
            .filter(links::Column::Token.eq(token))
            .one(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Unknown validation link".to_string()))
    }

    /// Consume a validation link.
    ///
    /// Idempotent: the first visit stamps `consumed_at` and marks the
    /// student's email validated; every later visit re-applies the same
    /// downstream state without erroring, so the page can be safely
    /// refreshed (and the prize flow re-run) any number of times.
    pub async fn consume_link(
        &self,
        link: &links::Model,
        now: DateTime<Utc>,
    ) -> AppResult<links::Model> {
        let txn = self.pool.begin().await?;

        let fresh = links::Entity::find_by_id(link.id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Unknown validation link".to_string()))?;

        let consumed = if fresh.consumed_at.is_none() {
            let mut active = fresh.into_active_model();
            active.consumed_at = Set(Some(now));
            active.update(&txn).await?
        } else {
            fresh
        };

        let student = students::Entity::find_by_id(consumed.student_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Student {} not found", consumed.student_id))
            })?;

        let mut changed = false;
        let mut active = student.clone().into_active_model();
        if student.email_validated_at.is_none() {
            active.email_validated_at = Set(Some(now));
            changed = true;
        }
        // A validated address that differs from the first-seen one is
        // accumulated rather than overwriting it.
        if consumed.email != student.email {
            let mut others = student.other_emails_vec();
            if !others.contains(&consumed.email) {
                others.push(consumed.email.clone());
                active.other_emails = Set(json!(others));
                changed = true;
            }
        }
        if changed {
            active.update(&txn).await?;
        }

        txn.commit().await?;
        Ok(consumed)
    }
}
