use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AgcodConfig;
use crate::error::{AppError, AppResult};
use crate::external::sigv4::SigV4Signer;

const AGCOD_SERVICE: &str = "AGCODService";
const AGCOD_TARGET_PREFIX: &str = "com.amazonaws.agcod";
const DEFAULT_CURRENCY: &str = "USD";

/// Transport seam for the vendor client.
///
/// Production uses [`ReqwestInvoker`]; tests swap in a recording mock to
/// assert call counts and request payloads without any network.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Perform the request and return the parsed JSON object body.
    async fn invoke(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> AppResult<serde_json::Value>;
}

pub struct ReqwestInvoker {
    client: Client,
}

impl ReqwestInvoker {
    pub fn new() -> Self {
        ReqwestInvoker {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Invoker for ReqwestInvoker {
    async fn invoke(
        &self,
        method: &str,
        url: &str,
        headers: &[(String, String)],
        body: &[u8],
    ) -> AppResult<serde_json::Value> {
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| AppError::InternalError(format!("Invalid HTTP method: {method}")))?;
        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| AppError::VendorUnavailable(format!("transport error: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::VendorUnavailable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            log::error!("Vendor request to {url} failed with {status}: {text}");
            return Err(AppError::VendorUnavailable(format!(
                "vendor returned {status}"
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            log::error!("Vendor response from {url} is not JSON: {text}");
            AppError::VendorProtocol("response body is not JSON".to_string())
        })?;
        if !value.is_object() {
            log::error!("Vendor response from {url} is not a JSON object: {text}");
            return Err(AppError::VendorProtocol(
                "response body is not a JSON object".to_string(),
            ));
        }
        Ok(value)
    }
}

/// Parse the vendor's timestamp format, e.g. `20240515T000000Z`.
pub fn parse_agcod_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ").map(|naive| Utc.from_utc_datetime(&naive))
}

mod agcod_timestamp {
    use super::parse_agcod_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y%m%dT%H%M%SZ";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_agcod_timestamp(&raw).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub mod option {
        use super::{FORMAT, parse_agcod_timestamp};
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => parse_agcod_timestamp(&raw)
                    .map(Some)
                    .map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }

        pub fn serialize<S>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_some(&value.format(FORMAT).to_string()),
                None => serializer.serialize_none(),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    Success,
    Failure,
    Resend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardStatus {
    Fulfilled,
    RefundedToPurchaser,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonetaryValue {
    pub amount: i64,
    pub currency_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    pub card_number: Option<String>,
    pub card_status: CardStatus,
    #[serde(with = "agcod_timestamp::option")]
    pub expiration_date: Option<DateTime<Utc>>,
    pub value: MonetaryValue,
}

/// Response from `CreateGiftCard` (and thus also from a check, which is the
/// same operation replayed with an existing request id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGiftCardResponse {
    pub card_info: CardInfo,
    pub creation_request_id: String,
    pub gc_claim_code: String,
    #[serde(with = "agcod_timestamp::option")]
    pub gc_expiration_date: Option<DateTime<Utc>>,
    pub gc_id: String,
    pub status: StatusCode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetAvailableFundsResponse {
    pub available_funds: MonetaryValue,
    pub status: StatusCode,
    #[serde(with = "agcod_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateGiftCardRequest {
    creation_request_id: String,
    partner_id: String,
    value: MonetaryValue,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GetAvailableFundsRequest {
    partner_id: String,
}

/// Client for the AGCOD (Amazon Gift Codes On Demand) API.
///
/// Every call is a signed JSON-RPC style POST to
/// `https://{endpoint_host}/{operation}` with an
/// `x-amz-target: com.amazonaws.agcod.AGCODService.{operation}` header.
///
/// A useful URL for testing is the API Scratchpad:
/// https://s3.amazonaws.com/AGCOD/htmlSDKv2/htmlSDKv2_NAEUFE/index.html
#[derive(Clone)]
pub struct AgcodClient {
    signer: SigV4Signer,
    endpoint_host: String,
    partner_id: String,
    invoker: Arc<dyn Invoker>,
}

impl std::fmt::Debug for AgcodClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgcodClient")
            .field("endpoint_host", &self.endpoint_host)
            .field("partner_id", &self.partner_id)
            .finish_non_exhaustive()
    }
}

impl AgcodClient {
    /// Build a client from configuration, failing fast if any required field
    /// is missing.
    pub fn from_config(config: &AgcodConfig) -> AppResult<Self> {
        Self::with_invoker(config, Arc::new(ReqwestInvoker::new()))
    }

    pub fn with_invoker(config: &AgcodConfig, invoker: Arc<dyn Invoker>) -> AppResult<Self> {
        for (field, value) in [
            ("agcod.access_key_id", &config.access_key_id),
            ("agcod.secret_access_key", &config.secret_access_key),
            ("agcod.region", &config.region),
            ("agcod.endpoint_host", &config.endpoint_host),
            ("agcod.partner_id", &config.partner_id),
        ] {
            if value.is_empty() {
                return Err(AppError::ConfigError(format!("Missing {field}")));
            }
        }
        Ok(AgcodClient {
            signer: SigV4Signer::new(
                &config.access_key_id,
                &config.secret_access_key,
                &config.region,
                AGCOD_SERVICE,
            ),
            endpoint_host: config.endpoint_host.clone(),
            partner_id: config.partner_id.clone(),
            invoker,
        })
    }

    /// Build a creation request id from a stable per-entry token.
    ///
    /// The token must be fixed at entry-creation time and never regenerated:
    /// the vendor deduplicates on (request id, amount, currency), so a fresh
    /// token on retry would fund a second card.
    pub fn make_request_id(&self, token: &str) -> String {
        format!("{}-{token}", self.partner_id)
    }

    /// Create a gift card, or fetch the status of an existing one.
    ///
    /// The `CreateGiftCard` operation is idempotent server-side: replaying
    /// the same (creation_request_id, amount, currency_code) tuple returns
    /// the same gift card rather than funding a new one. The vendor's
    /// documentation recommends never storing the claim code locally;
    /// store the creation details and re-check as needed.
    pub async fn create_gift_card(
        &self,
        amount: i64,
        creation_request_id: &str,
        currency_code: &str,
    ) -> AppResult<CreateGiftCardResponse> {
        let request = CreateGiftCardRequest {
            creation_request_id: creation_request_id.to_string(),
            partner_id: self.partner_id.clone(),
            value: MonetaryValue {
                amount,
                currency_code: currency_code.to_string(),
            },
        };
        self.post_json_rpc("CreateGiftCard", &request).await
    }

    /// Fetch the status of a previously created gift card.
    ///
    /// Only call this with a request id that has minted before; the endpoint
    /// is the same as creation, so an unknown id would fund a card.
    pub async fn check_gift_card(
        &self,
        amount: i64,
        creation_request_id: &str,
    ) -> AppResult<CreateGiftCardResponse> {
        self.create_gift_card(amount, creation_request_id, DEFAULT_CURRENCY)
            .await
    }

    /// Read-only balance check; operational, not in the hot path.
    pub async fn get_available_funds(&self) -> AppResult<GetAvailableFundsResponse> {
        let request = GetAvailableFundsRequest {
            partner_id: self.partner_id.clone(),
        };
        self.post_json_rpc("GetAvailableFunds", &request).await
    }

    async fn post_json_rpc<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: &impl Serialize,
    ) -> AppResult<T> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| AppError::InternalError(format!("Failed to encode request: {e}")))?;
        let now = Utc::now();

        let mut headers = vec![
            ("accept".to_string(), "application/json".to_string()),
            ("content-type".to_string(), "application/json".to_string()),
            ("host".to_string(), self.endpoint_host.clone()),
            ("x-amz-date".to_string(), SigV4Signer::format_amz_date(now)),
            (
                "x-amz-target".to_string(),
                format!("{AGCOD_TARGET_PREFIX}.{AGCOD_SERVICE}.{operation}"),
            ),
        ];
        let path = format!("/{operation}");
        let authorization = self
            .signer
            .authorization_header("POST", &path, &headers, &payload, now);
        headers.push(("authorization".to_string(), authorization));

        let url = format!("https://{}{path}", self.endpoint_host);
        log::debug!("AGCOD request: POST {url}");
        let value = self.invoker.invoke("POST", &url, &headers, &payload).await?;
        log::debug!("AGCOD response: {value}");

        serde_json::from_value(value).map_err(|e| {
            log::error!("Vendor response did not match the {operation} contract: {e}");
            AppError::VendorProtocol(format!("unexpected {operation} response shape"))
        })
    }
}
