use pearl_core::PearlError;
use reqwest::StatusCode;

/// Map a non-success HTTP status into the error taxonomy. Overload and
/// gateway failures are transient; 429 carries its retry hint.
pub(crate) fn status_error(
    provider: &str,
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
) -> PearlError {
    match status.as_u16() {
        429 => PearlError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(2),
        },
        500 | 502 | 503 | 504 | 529 => {
            PearlError::Transient(format!("{provider}: HTTP {status}: {body}"))
        }
        _ => PearlError::Provider(format!("{provider}: HTTP {status}: {body}")),
    }
}

/// Map a transport error. Timeouts and dropped connections are transient.
pub(crate) fn send_error(provider: &str, err: reqwest::Error) -> PearlError {
    if err.is_timeout() || err.is_connect() {
        PearlError::Transient(format!("{provider}: {err}"))
    } else {
        PearlError::Provider(format!("{provider}: request failed: {err}"))
    }
}

/// Turn a response into its JSON body, or the classified error.
pub(crate) async fn json_body(
    provider: &str,
    resp: reqwest::Response,
) -> Result<serde_json::Value, PearlError> {
    let status = resp.status();
    if !status.is_success() {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let text = resp.text().await.unwrap_or_default();
        return Err(status_error(provider, status, retry_after, &text));
    }
    resp.json()
        .await
        .map_err(|e| PearlError::MalformedOutput(format!("{provider}: invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = status_error("gemini", StatusCode::SERVICE_UNAVAILABLE, None, "overloaded");
        assert!(err.is_transient());
        assert!(err.to_string().contains("503"));

        let err = status_error("gemini", StatusCode::TOO_MANY_REQUESTS, Some(7), "");
        assert!(matches!(err, PearlError::RateLimited { retry_after_secs: 7 }));

        let err = status_error("gemini", StatusCode::BAD_REQUEST, None, "bad prompt");
        assert!(!err.is_transient());
    }
}
