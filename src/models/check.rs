use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ContestSummary;

/// Data POSTed when a student has completed a registration check.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FinishCheckRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Response to a finished check.
///
/// Deliberately silent about the roll outcome: win or lose is only revealed
/// behind the validation link, after the student proves control of the
/// address.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FinishCheckResponse {
    pub email: String,
    pub contest: Option<ContestSummary>,
    /// Present when a contest was entered; `true` if the student had
    /// already entered it before this submission.
    pub already_entered: Option<bool>,
}
