use actix_web::{HttpResponse, ResponseError, Result, web};
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::AppResult;
use crate::models::{ContestSummary, SchoolResponse};
use crate::services::{ContestService, SchoolService};

#[utoipa::path(
    get,
    path = "/schools/{slug}",
    tag = "school",
    params(
        ("slug" = String, Path, description = "School slug")
    ),
    responses(
        (status = 200, description = "School with its current or next contest", body = SchoolResponse),
        (status = 404, description = "Unknown school")
    )
)]
/// A school and its contest status, for the school and check pages.
pub async fn get_school(
    schools: web::Data<SchoolService>,
    contests: web::Data<ContestService>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let slug = path.into_inner();
    match school_page(&schools, &contests, &slug, Utc::now()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

async fn school_page(
    schools: &SchoolService,
    contests: &ContestService,
    slug: &str,
    now: DateTime<Utc>,
) -> AppResult<SchoolResponse> {
    let school = schools.get_by_slug(slug).await?;
    let contest = match contests.current_contest(school.id, now).await? {
        Some(contest) => Some(contest),
        None => contests.next_upcoming_contest(school.id, now).await?,
    };
    Ok(SchoolResponse::from_school(
        &school,
        contest.map(|contest| ContestSummary::from_contest(&contest, now)),
    ))
}

pub fn school_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/schools/{slug}", web::get().to(get_school));
}
