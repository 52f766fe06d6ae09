//! IP-geolocation gate. Looked up once at startup; a failed lookup (or a
//! restricted country) leaves trading gated off.

use serde::Deserialize;

use crate::config::RESTRICTED_COUNTRIES;

#[derive(Debug, Deserialize)]
pub struct GeoResponse {
    pub country_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoVerdict {
    pub country: String,
    pub allowed: bool,
}

pub fn is_restricted(country_code: &str) -> bool {
    RESTRICTED_COUNTRIES
        .iter()
        .any(|c| c.eq_ignore_ascii_case(country_code))
}

pub async fn check_geo(http: &reqwest::Client, url: &str) -> anyhow::Result<GeoVerdict> {
    let resp: GeoResponse = http.get(url).send().await?.error_for_status()?.json().await?;
    Ok(GeoVerdict {
        allowed: !is_restricted(&resp.country_code),
        country: resp.country_code,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restriction_list() {
        assert!(is_restricted("US"));
        assert!(is_restricted("us"));
        assert!(!is_restricted("DE"));
    }
}
