use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Timestamp format required in the `x-amz-date` header and the string to
/// sign, e.g. `20240515T173102Z`.
pub const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";

const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// AWS Signature Version 4 request signer.
///
/// Carries no business logic: given a request (method, path, headers,
/// payload) and an explicit timestamp, it produces the `Authorization`
/// header the vendor requires. Canonicalization is deterministic, so a fixed
/// clock and credential yield byte-for-byte reproducible header values.
///
/// Only what the gift code API needs is implemented: POSTs to a bare path
/// with no query string.
#[derive(Clone)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(access_key_id: &str, secret_access_key: &str, region: &str, service: &str) -> Self {
        SigV4Signer {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// Format a timestamp the way the signing scheme (and the vendor's
    /// `x-amz-date` header) expects it.
    pub fn format_amz_date(at: DateTime<Utc>) -> String {
        at.format(AMZ_DATE_FORMAT).to_string()
    }

    /// Compute the `Authorization` header for a request.
    ///
    /// `headers` must contain every header that participates in the
    /// signature (at minimum `host` and `x-amz-date`), and `at` must match
    /// the `x-amz-date` value, or the vendor will reject the request.
    pub fn authorization_header(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        payload: &[u8],
        at: DateTime<Utc>,
    ) -> String {
        let amz_date = Self::format_amz_date(at);
        let date_stamp = at.format("%Y%m%d").to_string();

        let (canonical_request, signed_headers) = canonical_request(method, path, headers, payload);

        let credential_scope = format!(
            "{date_stamp}/{}/{}/aws4_request",
            self.region, self.service
        );
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{credential_scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = self.signing_key(&date_stamp);
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        format!(
            "{ALGORITHM} Credential={}/{credential_scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        )
    }

    /// Derive the per-day signing key: a four-step HMAC chain over the
    /// secret, date, region, service, and the literal `aws4_request`.
    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let k_date = hmac_sha256(
            format!("AWS4{}", self.secret_access_key).as_bytes(),
            date_stamp.as_bytes(),
        );
        let k_region = hmac_sha256(&k_date, self.region.as_bytes());
        let k_service = hmac_sha256(&k_region, self.service.as_bytes());
        hmac_sha256(&k_service, b"aws4_request")
    }
}

/// Build the canonical request string and the `;`-joined signed header list.
///
/// Header names are lowercased, values trimmed, and the set sorted by name.
/// The canonical query string is always empty: the vendor API takes no query
/// parameters.
fn canonical_request(
    method: &str,
    path: &str,
    headers: &[(String, String)],
    payload: &[u8],
) -> (String, String) {
    let mut canonical_headers: Vec<(String, String)> = headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
        .collect();
    canonical_headers.sort();

    let signed_headers = canonical_headers
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(";");
    let header_block: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    let payload_hash = hex::encode(Sha256::digest(payload));

    let canonical = format!("{method}\n{path}\n\n{header_block}\n{signed_headers}\n{payload_hash}");
    (canonical, signed_headers)
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC-SHA256 accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// SHA-256 of the empty string, as listed in the signature scheme docs.
    const EMPTY_PAYLOAD_HASH: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn test_signer() -> SigV4Signer {
        // The credential from the published signature derivation example.
        SigV4Signer::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "us-east-1",
            "iam",
        )
    }

    #[test]
    fn test_signing_key_matches_published_vector() {
        let signer = test_signer();
        // Expected value from the official "deriving the signing key"
        // worked example for 20150830/us-east-1/iam.
        assert_eq!(
            hex::encode(signer.signing_key("20150830")),
            "c4afb1cc5771d871763a393e44b703571b55cc28424d1a5e86da6ed3c154a4b9"
        );
    }

    #[test]
    fn test_empty_payload_hash() {
        let (canonical, _) = canonical_request("POST", "/", &[], b"");
        assert!(canonical.ends_with(EMPTY_PAYLOAD_HASH));
    }

    #[test]
    fn test_canonical_request_layout() {
        let headers = vec![
            ("X-Amz-Date".to_string(), "20150830T123600Z".to_string()),
            ("Host".to_string(), "example.amazonaws.com".to_string()),
            ("Content-Type".to_string(), " application/json ".to_string()),
        ];
        let (canonical, signed_headers) =
            canonical_request("POST", "/CreateGiftCard", &headers, b"");

        // Names lowercased and sorted, values trimmed, one per line, then a
        // blank line, the signed header list, and the payload hash.
        let expected = format!(
            "POST\n/CreateGiftCard\n\n\
             content-type:application/json\n\
             host:example.amazonaws.com\n\
             x-amz-date:20150830T123600Z\n\
             \n\
             content-type;host;x-amz-date\n\
             {EMPTY_PAYLOAD_HASH}"
        );
        assert_eq!(canonical, expected);
        assert_eq!(signed_headers, "content-type;host;x-amz-date");
    }

    #[test]
    fn test_authorization_header_is_deterministic() {
        let signer = test_signer();
        let at = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = vec![
            ("host".to_string(), "example.amazonaws.com".to_string()),
            ("x-amz-date".to_string(), "20150830T123600Z".to_string()),
        ];
        let first = signer.authorization_header("POST", "/", &headers, b"{}", at);
        let second = signer.authorization_header("POST", "/", &headers, b"{}", at);
        assert_eq!(first, second);
    }

    #[test]
    fn test_authorization_header_structure() {
        let signer = test_signer();
        let at = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = vec![
            ("host".to_string(), "example.amazonaws.com".to_string()),
            ("x-amz-date".to_string(), "20150830T123600Z".to_string()),
        ];
        let auth = signer.authorization_header("POST", "/", &headers, b"{}", at);

        assert!(auth.starts_with(
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20150830/us-east-1/iam/aws4_request, "
        ));
        assert!(auth.contains("SignedHeaders=host;x-amz-date, "));
        let signature = auth
            .rsplit("Signature=")
            .next()
            .expect("authorization header carries a signature");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_depends_on_payload() {
        let signer = test_signer();
        let at = Utc.with_ymd_and_hms(2015, 8, 30, 12, 36, 0).unwrap();
        let headers = vec![("host".to_string(), "example.amazonaws.com".to_string())];
        let a = signer.authorization_header("POST", "/", &headers, b"{\"a\":1}", at);
        let b = signer.authorization_header("POST", "/", &headers, b"{\"a\":2}", at);
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_amz_date() {
        let at = Utc.with_ymd_and_hms(2024, 5, 15, 17, 31, 2).unwrap();
        assert_eq!(SigV4Signer::format_amz_date(at), "20240515T173102Z");
    }
}
