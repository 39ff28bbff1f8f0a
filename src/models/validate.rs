use serde::Serialize;
use utoipa::ToSchema;

/// Outcome of visiting an email validation link.
///
/// Idempotent by construction: revisiting the same link renders the same
/// response (modulo vendor availability), never a new roll or a new card.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ValidateEmailResponse {
    pub validated: bool,
    pub is_winner: bool,
    pub amount_won: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prize: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claim_code: Option<String>,
}
