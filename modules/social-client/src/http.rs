//! Response handling shared by the adapters: status checks, structural
//! validation, error-variant selection per call site.

use chrono::{DateTime, Utc};
use creatorlink_common::Platform;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ProviderError, Result};

/// Which operation a provider call belongs to; picks the error variant a
/// failed call maps to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CallKind {
    Exchange,
    Refresh,
    Fetch,
}

/// Check the status and parse the body as JSON. Non-2xx maps to the error
/// variant for `kind`; a non-JSON body is always `InvalidResponse`.
pub(crate) async fn read_json(
    platform: Platform,
    kind: CallKind,
    resp: reqwest::Response,
) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        let detail = format!("HTTP {}: {}", status.as_u16(), truncate(&body, 512));
        return Err(match kind {
            CallKind::Exchange => ProviderError::AuthExchange { platform, detail },
            CallKind::Refresh => ProviderError::Refresh { platform, detail },
            CallKind::Fetch => ProviderError::Api {
                platform,
                status: status.as_u16(),
                detail,
            },
        });
    }
    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        platform,
        detail: format!("body is not JSON: {e}"),
    })
}

/// Structurally validate a payload against `T`. A mismatch on an exchange or
/// refresh call means the provider sent a non-token payload.
pub(crate) fn decode<T: DeserializeOwned>(
    platform: Platform,
    kind: CallKind,
    value: Value,
) -> Result<T> {
    serde_json::from_value(value).map_err(|e| match kind {
        CallKind::Exchange => ProviderError::AuthExchange {
            platform,
            detail: format!("non-token payload: {e}"),
        },
        CallKind::Refresh => ProviderError::Refresh {
            platform,
            detail: format!("non-token payload: {e}"),
        },
        CallKind::Fetch => ProviderError::InvalidResponse {
            platform,
            detail: e.to_string(),
        },
    })
}

/// Post timestamps are best-effort: RFC 3339 first, then the `+0000` offset
/// form Facebook and Instagram emit. Unparseable values become `None`.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z").ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
