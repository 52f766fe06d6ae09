//! Perp funding-rate REST feed.

use serde::Deserialize;

use crate::state::snapshots::FundingRate;
use crate::util::now_ms;

#[derive(Debug, Deserialize)]
pub struct FundingResponse {
    pub market: String,
    /// Hourly rate as a fraction.
    pub hourly_rate: f64,
    #[serde(default)]
    pub open_interest: f64,
}

impl From<FundingResponse> for FundingRate {
    fn from(resp: FundingResponse) -> Self {
        FundingRate {
            hourly_rate: resp.hourly_rate,
            open_interest: resp.open_interest,
            ts_ms: now_ms(),
        }
    }
}

pub async fn fetch_funding(
    http: &reqwest::Client,
    base_url: &str,
    market: &str,
) -> anyhow::Result<FundingRate> {
    let url = format!("{base_url}/{market}");
    let resp: FundingResponse = http.get(&url).send().await?.error_for_status()?.json().await?;
    Ok(resp.into())
}

/// Annualized percentage from an hourly fraction, for display.
pub fn annualized_pct(hourly_rate: f64) -> f64 {
    hourly_rate * 24.0 * 365.0 * 100.0
}
