use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::models::{ContestSummary, FinishCheckRequest, FinishCheckResponse};
use crate::services::{ContestService, EntryService, SchoolService, StudentService, ValidationService};
use crate::utils::{EmailPolicy, hash_email, is_valid_for_school};
use crate::utils::email::is_plausible_address;

#[utoipa::path(
    post,
    path = "/schools/{slug}/check",
    tag = "check",
    params(
        ("slug" = String, Path, description = "School slug")
    ),
    request_body = FinishCheckRequest,
    responses(
        (status = 200, description = "Check recorded; a validation email is on its way", body = FinishCheckResponse),
        (status = 400, description = "Invalid name or non-school email address"),
        (status = 404, description = "Unknown school")
    )
)]
/// Finish a registration check:
/// 1. Validate the address against the school's domain policy
/// 2. Get or create the student by normalized-email hash
/// 3. Enter the relevant contest (the die is rolled here, exactly once)
/// 4. Always send a validation link, even for already-validated students -
///    the claim code only ever appears behind that link
pub async fn finish_check(
    schools: web::Data<SchoolService>,
    contests: web::Data<ContestService>,
    students: web::Data<StudentService>,
    entries: web::Data<EntryService>,
    validations: web::Data<ValidationService>,
    path: web::Path<String>,
    body: web::Json<FinishCheckRequest>,
) -> Result<HttpResponse> {
    let slug = path.into_inner();
    let request = body.into_inner();
    match run_finish_check(
        &schools,
        &contests,
        &students,
        &entries,
        &validations,
        &slug,
        &request,
        Utc::now(),
    )
    .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_finish_check(
    schools: &SchoolService,
    contests: &ContestService,
    students: &StudentService,
    entries: &EntryService,
    validations: &ValidationService,
    slug: &str,
    request: &FinishCheckRequest,
    now: DateTime<Utc>,
) -> AppResult<FinishCheckResponse> {
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(AppError::ValidationError(
            "First and last name are required".to_string(),
        ));
    }

    let school = schools.get_by_slug(slug).await?;
    let policy = EmailPolicy::from(&school);
    let email = request.email.trim();
    if !is_plausible_address(email) {
        return Err(AppError::ValidationError(
            "That doesn't look like an email address".to_string(),
        ));
    }
    if !is_valid_for_school(email, &policy) {
        return Err(AppError::ValidationError(format!(
            "Please use your {} email address",
            school.name
        )));
    }

    let hash = hash_email(email, &policy);
    let student = students
        .get_or_create_student(&school, &hash, email, first_name, last_name)
        .await?;

    // Prefer the ongoing contest. With none ongoing, a submission still
    // lands against the most recently ended one, where it records a
    // guaranteed loss - late entries must never re-open the odds.
    let contest = match contests.current_contest(school.id, now).await? {
        Some(contest) => Some(contest),
        None => contests.most_recent_past_contest(school.id, now).await?,
    };

    let entered = match &contest {
        Some(contest) => Some(entries.enter_contest(&student, contest, now).await?),
        None => None,
    };

    validations
        .send_validation_link(
            &school,
            &student,
            email,
            entered.as_ref().map(|(entry, _)| entry),
        )
        .await?;

    Ok(FinishCheckResponse {
        email: email.to_string(),
        contest: contest.map(|c| ContestSummary::from_contest(&c, now)),
        already_entered: entered.map(|(_, is_new)| !is_new),
    })
}

pub fn check_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/schools/{slug}/check", web::post().to(finish_check));
}
