use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::ContestKind;
use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::school::get_school,
        handlers::check::finish_check,
        handlers::validate::validate_email,
    ),
    components(
        schemas(
            SchoolResponse,
            ContestSummary,
            ContestKind,
            FinishCheckRequest,
            FinishCheckResponse,
            ValidateEmailResponse,
            ApiError,
        )
    ),
    tags(
        (name = "school", description = "School and contest status"),
        (name = "check", description = "Registration check flow"),
        (name = "validate", description = "Email validation and prize issuance"),
    ),
    info(
        title = "Voter Bowl Backend API",
        version = "1.0.0",
        description = "Contest entry and prize issuance API"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
