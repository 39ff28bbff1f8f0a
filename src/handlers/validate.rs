use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::ValidateEmailResponse;
use crate::services::{ContestService, EntryService, SchoolService, StudentService, ValidationService};

#[utoipa::path(
    get,
    path = "/schools/{slug}/validate/{token}",
    tag = "validate",
    params(
        ("slug" = String, Path, description = "School slug"),
        ("token" = String, Path, description = "Validation link token")
    ),
    responses(
        (status = 200, description = "Email validated; claim code included for issued winners", body = ValidateEmailResponse),
        (status = 403, description = "Link belongs to a different school"),
        (status = 404, description = "Unknown school or token"),
        (status = 502, description = "Prize issuance temporarily unavailable; safe to retry")
    )
)]
/// Consume a validation link (idempotently) and run prize issuance.
///
/// Revisiting the same link re-renders the same outcome; it never re-rolls
/// or re-mints. A vendor failure leaves the entry unissued and this same
/// URL retryable.
pub async fn validate_email(
    schools: web::Data<SchoolService>,
    contests: web::Data<ContestService>,
    students: web::Data<StudentService>,
    entries: web::Data<EntryService>,
    validations: web::Data<ValidationService>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse> {
    let (slug, token) = path.into_inner();
    match run_validate(
        &schools,
        &contests,
        &students,
        &entries,
        &validations,
        &slug,
        &token,
        Utc::now(),
    )
    .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_validate(
    schools: &SchoolService,
    contests: &ContestService,
    students: &StudentService,
    entries: &EntryService,
    validations: &ValidationService,
    slug: &str,
    token: &str,
    now: DateTime<Utc>,
) -> AppResult<ValidateEmailResponse> {
    let school = schools.get_by_slug(slug).await?;
    let link = validations.find_link_by_token(token).await?;

    // The token is the secret; the slug is routing only. Still, a link must
    // not consume under a different school's URL (slug-swap).
    let student = students.get_by_id(link.student_id).await?;
    if student.school_id != school.id {
        return Err(AppError::PermissionDenied);
    }

    let link = validations.consume_link(&link, now).await?;

    let Some(entry_id) = link.contest_entry_id else {
        return Ok(ValidateEmailResponse {
            validated: true,
            is_winner: false,
            amount_won: 0,
            prize: None,
            claim_code: None,
        });
    };

    let entry = entries.get_entry(entry_id).await?;
    let contest = contests.get_by_id(entry.contest_id).await?;
    let (entry, claim_code) = entries.get_or_issue_prize(&entry).await?;

    Ok(ValidateEmailResponse {
        validated: true,
        is_winner: entry.is_winner(),
        amount_won: entry.amount_won,
        prize: Some(contest.prize_long),
        claim_code,
    })
}

pub fn validate_config(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/schools/{slug}/validate/{token}",
        web::get().to(validate_email),
    );
}
