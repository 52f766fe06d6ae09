//! OHLCV candle REST feed. The endpoint returns parallel arrays, one per
//! field, which are zipped into candle rows.

use serde::Deserialize;

use crate::state::snapshots::Candle;

#[derive(Debug, Deserialize)]
pub struct OhlcvResponse {
    pub t: Vec<u64>,
    pub o: Vec<f64>,
    pub h: Vec<f64>,
    pub l: Vec<f64>,
    pub c: Vec<f64>,
    pub v: Vec<f64>,
}

impl OhlcvResponse {
    /// Zip the column arrays into rows, truncating to the shortest column
    /// if the server returns ragged data.
    pub fn into_candles(self) -> Vec<Candle> {
        let len = [
            self.t.len(),
            self.o.len(),
            self.h.len(),
            self.l.len(),
            self.c.len(),
            self.v.len(),
        ]
        .into_iter()
        .min()
        .unwrap_or(0);

        (0..len)
            .map(|i| Candle {
                ts_ms: self.t[i],
                open: self.o[i],
                high: self.h[i],
                low: self.l[i],
                close: self.c[i],
                volume: self.v[i],
            })
            .collect()
    }
}

pub async fn fetch_candles(
    http: &reqwest::Client,
    base_url: &str,
    market: &str,
    resolution_secs: u64,
    from_ms: u64,
    to_ms: u64,
) -> anyhow::Result<Vec<Candle>> {
    let url = format!(
        "{base_url}?market={market}&resolution={resolution_secs}&start_time={from_ms}&end_time={to_ms}"
    );
    let resp: OhlcvResponse = http.get(&url).send().await?.error_for_status()?.json().await?;
    Ok(resp.into_candles())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_zip_into_rows() {
        let resp: OhlcvResponse = serde_json::from_str(
            r#"{"t":[1000,2000],"o":[1.0,2.0],"h":[1.5,2.5],"l":[0.5,1.5],"c":[1.2,2.2],"v":[10.0,20.0]}"#,
        )
        .unwrap();
        let candles = resp.into_candles();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].ts_ms, 2000);
        assert_eq!(candles[1].close, 2.2);
    }

    #[test]
    fn ragged_columns_truncate() {
        let resp: OhlcvResponse = serde_json::from_str(
            r#"{"t":[1000,2000,3000],"o":[1.0],"h":[1.5],"l":[0.5],"c":[1.2],"v":[10.0]}"#,
        )
        .unwrap();
        assert_eq!(resp.into_candles().len(), 1);
    }
}
