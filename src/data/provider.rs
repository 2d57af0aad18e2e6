//! Tushare Pro HTTP client
//!
//! Every Tushare Pro API is a POST of `{api_name, token, params, fields}` to a
//! single endpoint, answered by `{code, msg, data: {fields, items}}`. Price bars
//! additionally follow the provider's `pro_bar` convenience: the frequency
//! picks the underlying API and an adjustment mode rescales prices with the
//! `adj_factor` table.

use std::collections::HashMap;
use std::future::Future;

use polars::prelude::DataFrame;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::frame::RawTable;
use super::{Dataset, ProviderError};
use crate::cache::QueryParams;

/// Default Tushare Pro endpoint
pub const TUSHARE_API_URL: &str = "http://api.tushare.pro";

/// Price columns rescaled by an adjustment
const PRICE_FIELDS: [&str; 5] = ["open", "high", "low", "close", "pre_close"];

/// Parameters consumed by the price bar logic rather than passed upstream
const BAR_OPTIONS: [&str; 3] = ["adj", "freq", "asset"];

/// Anything that can produce a table for a dataset query
///
/// [`TushareClient`] is the production implementation; tests substitute their
/// own.
pub trait RemoteSource {
    fn fetch(
        &self,
        dataset: Dataset,
        params: &QueryParams,
    ) -> impl Future<Output = Result<DataFrame, ProviderError>>;
}

/// Price adjustment mode for bars
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Forward adjusted: scaled relative to the latest factor
    Forward,
    /// Backward adjusted: scaled by the raw factor
    Backward,
}

impl Adjustment {
    pub fn from_param(value: &str) -> Option<Self> {
        match value {
            "qfq" => Some(Adjustment::Forward),
            "hfq" => Some(Adjustment::Backward),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    api_name: &'a str,
    token: &'a str,
    params: &'a QueryParams,
    fields: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<RawTable>,
}

/// Client for the Tushare Pro API
#[derive(Debug, Clone)]
pub struct TushareClient {
    client: Client,
    token: String,
    base_url: String,
}

impl TushareClient {
    /// Create a new TushareClient for the given API token
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), token)
    }

    /// Create a new TushareClient with a custom HTTP client
    pub fn with_client(client: Client, token: impl Into<String>) -> Self {
        Self {
            client,
            token: token.into(),
            base_url: TUSHARE_API_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call one API and return its raw table
    ///
    /// # Returns
    /// * `Ok(RawTable)` - Fields and rows, possibly empty
    /// * `Err(ProviderError)` - If the request fails or the API reports an error
    pub async fn query(&self, api_name: &str, params: &QueryParams) -> Result<RawTable, ProviderError> {
        let request = ApiRequest {
            api_name,
            token: &self.token,
            params,
            fields: "",
        };

        tracing::debug!(api_name, params = params.len(), "Calling Tushare API");
        let response = self.client.post(&self.base_url).json(&request).send().await?;
        let text = response.text().await?;
        parse_response(&text)
    }

    /// Fetch OHLCV bars the way `pro_bar` does
    async fn price_bars(&self, params: &QueryParams) -> Result<DataFrame, ProviderError> {
        let freq = params.get("freq").unwrap_or("D");
        let asset = params.get("asset").unwrap_or("E");
        let adjustment = match params.get("adj") {
            None => None,
            Some(adj) => Some(
                Adjustment::from_param(adj)
                    .ok_or_else(|| ProviderError::Unsupported(format!("adj={}", adj)))?,
            ),
        };

        let api_name = bars_api(asset, freq)?;
        if adjustment.is_some() && asset != "E" {
            return Err(ProviderError::Unsupported(format!("adj for asset={}", asset)));
        }

        let mut upstream = params.clone();
        for option in BAR_OPTIONS {
            upstream.remove(option);
        }

        let Some(adjustment) = adjustment else {
            return self.query(api_name, &upstream).await?.into_frame();
        };

        let factor_params = QueryParams::new()
            .with_opt("ts_code", upstream.get("ts_code"))
            .with_opt("start_date", upstream.get("start_date"))
            .with_opt("end_date", upstream.get("end_date"));

        let (mut bars, factors) = futures::try_join!(
            self.query(api_name, &upstream),
            self.query("adj_factor", &factor_params)
        )?;
        adjust_prices(&mut bars, &factors, adjustment)?;
        bars.into_frame()
    }
}

impl RemoteSource for TushareClient {
    async fn fetch(&self, dataset: Dataset, params: &QueryParams) -> Result<DataFrame, ProviderError> {
        match dataset {
            Dataset::PriceBars => self.price_bars(params).await,
            other => self.query(other.spec().api_name, params).await?.into_frame(),
        }
    }
}

/// Picks the bar API for an asset class and frequency
fn bars_api(asset: &str, freq: &str) -> Result<&'static str, ProviderError> {
    match (asset, freq) {
        ("E", "D") => Ok("daily"),
        ("E", "W") => Ok("weekly"),
        ("E", "M") => Ok("monthly"),
        ("I", "D") => Ok("index_daily"),
        ("I", "W") => Ok("index_weekly"),
        ("I", "M") => Ok("index_monthly"),
        _ => Err(ProviderError::Unsupported(format!("asset={} freq={}", asset, freq))),
    }
}

/// Parses a Tushare response body into its table
fn parse_response(text: &str) -> Result<RawTable, ProviderError> {
    let response: ApiResponse = serde_json::from_str(text)?;
    if response.code != 0 {
        return Err(ProviderError::Api {
            code: response.code,
            msg: response.msg.unwrap_or_default(),
        });
    }
    response
        .data
        .ok_or_else(|| ProviderError::MissingField("data".to_string()))
}

/// Rescales bar prices by their trade date's adjustment factor
///
/// Forward adjustment divides by the factor of the latest trade date in the
/// factor table. Prices are rounded to two decimals as the provider does. Rows
/// whose trade date has no factor get null prices. Zero factors count as
/// missing, and bars with no usable factor at all are an error in both modes.
pub fn adjust_prices(
    bars: &mut RawTable,
    factors: &RawTable,
    adjustment: Adjustment,
) -> Result<(), ProviderError> {
    if bars.items.is_empty() {
        return Ok(());
    }

    let factor_by_date = factor_map(factors)?;
    let latest = factor_by_date
        .iter()
        .max_by(|a, b| a.0.cmp(b.0))
        .map(|(_, factor)| *factor)
        .ok_or_else(|| ProviderError::MissingField("adj_factor".to_string()))?;

    let base = match adjustment {
        Adjustment::Backward => 1.0,
        Adjustment::Forward => latest,
    };

    let date_idx = bars
        .field_index("trade_date")
        .ok_or_else(|| ProviderError::MissingField("trade_date".to_string()))?;
    let price_idx: Vec<usize> = PRICE_FIELDS
        .iter()
        .filter_map(|field| bars.field_index(field))
        .collect();

    for row in bars.items.iter_mut() {
        let scale = row
            .get(date_idx)
            .and_then(Value::as_str)
            .and_then(|date| factor_by_date.get(date))
            .map(|factor| factor / base);

        for &idx in &price_idx {
            let Some(cell) = row.get_mut(idx) else {
                continue;
            };
            *cell = match (scale, cell.as_f64()) {
                (Some(scale), Some(price)) => Value::from(round2(price * scale)),
                _ => Value::Null,
            };
        }
    }

    Ok(())
}

fn factor_map(factors: &RawTable) -> Result<HashMap<String, f64>, ProviderError> {
    let date_idx = factors
        .field_index("trade_date")
        .ok_or_else(|| ProviderError::MissingField("adj_factor.trade_date".to_string()))?;
    let factor_idx = factors
        .field_index("adj_factor")
        .ok_or_else(|| ProviderError::MissingField("adj_factor.adj_factor".to_string()))?;

    Ok(factors
        .items
        .iter()
        .filter_map(|row| {
            let date = row.get(date_idx)?.as_str()?;
            let factor = row.get(factor_idx)?.as_f64().filter(|f| *f != 0.0)?;
            Some((date.to_string(), factor))
        })
        .collect())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_RESPONSE: &str = r#"{
        "request_id": "c7d2e7a6",
        "code": 0,
        "msg": "",
        "data": {
            "fields": ["ts_code", "trade_date", "open", "high", "low", "close", "pre_close", "vol"],
            "items": [
                ["000001.SZ", "20240104", 9.19, 9.26, 9.15, 9.21, 9.19, 1021000.5],
                ["000001.SZ", "20240103", 9.20, 9.24, 9.12, 9.18, 9.20, 876000.0]
            ],
            "has_more": false
        }
    }"#;

    fn factors() -> RawTable {
        serde_json::from_str(
            r#"{
                "fields": ["ts_code", "trade_date", "adj_factor"],
                "items": [
                    ["000001.SZ", "20240104", 2.0],
                    ["000001.SZ", "20240103", 1.0]
                ]
            }"#,
        )
        .expect("valid factors")
    }

    fn bars() -> RawTable {
        parse_response(VALID_RESPONSE).expect("valid bars")
    }

    #[test]
    fn test_parse_valid_response() {
        let table = bars();
        assert_eq!(table.fields.len(), 8);
        assert_eq!(table.items.len(), 2);
        assert!(!table.has_more);

        let frame = table.into_frame().expect("Should convert");
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.width(), 8);
    }

    #[test]
    fn test_parse_api_error() {
        let body = r#"{"request_id": "x", "code": 40101, "msg": "抱歉，您的token不对", "data": null}"#;
        match parse_response(body) {
            Err(ProviderError::Api { code, msg }) => {
                assert_eq!(code, 40101);
                assert!(msg.contains("token"));
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_missing_data() {
        let result = parse_response(r#"{"code": 0, "msg": ""}"#);
        assert!(matches!(result, Err(ProviderError::MissingField(_))));
    }

    #[test]
    fn test_parse_malformed_json() {
        let result = parse_response("{ invalid json }");
        assert!(matches!(result, Err(ProviderError::ParseError(_))));
    }

    #[test]
    fn test_request_serialization() {
        let params = QueryParams::new()
            .with("ts_code", "000001.SZ")
            .with("start_date", "20240101");
        let request = ApiRequest {
            api_name: "daily",
            token: "secret",
            params: &params,
            fields: "",
        };

        let json = serde_json::to_value(&request).expect("serializable");
        assert_eq!(
            json,
            serde_json::json!({
                "api_name": "daily",
                "token": "secret",
                "params": {"ts_code": "000001.SZ", "start_date": "20240101"},
                "fields": ""
            })
        );
    }

    #[test]
    fn test_backward_adjustment_multiplies_by_factor() {
        let mut table = bars();
        adjust_prices(&mut table, &factors(), Adjustment::Backward).expect("adjust");

        let close = table.field_index("close").expect("close");
        let vol = table.field_index("vol").expect("vol");
        assert_eq!(table.items[0][close].as_f64(), Some(18.42));
        assert_eq!(table.items[1][close].as_f64(), Some(9.18));
        // Volume is not a price
        assert_eq!(table.items[0][vol].as_f64(), Some(1021000.5));
    }

    #[test]
    fn test_forward_adjustment_scales_to_latest_factor() {
        let mut table = bars();
        adjust_prices(&mut table, &factors(), Adjustment::Forward).expect("adjust");

        let close = table.field_index("close").expect("close");
        let open = table.field_index("open").expect("open");
        assert_eq!(table.items[0][close].as_f64(), Some(9.21));
        assert_eq!(table.items[1][close].as_f64(), Some(4.59));
        assert_eq!(table.items[1][open].as_f64(), Some(4.6));
    }

    #[test]
    fn test_missing_factor_nulls_prices() {
        let mut table = bars();
        let partial: RawTable = serde_json::from_str(
            r#"{"fields": ["trade_date", "adj_factor"], "items": [["20240104", 3.0]]}"#,
        )
        .expect("valid factors");

        adjust_prices(&mut table, &partial, Adjustment::Backward).expect("adjust");
        let close = table.field_index("close").expect("close");
        assert_eq!(table.items[0][close].as_f64(), Some(27.63));
        assert!(table.items[1][close].is_null());
    }

    #[test]
    fn test_no_usable_factor_is_an_error_in_both_modes() {
        let no_factors: RawTable =
            serde_json::from_str(r#"{"fields": ["trade_date", "adj_factor"], "items": []}"#).expect("valid factors");
        let zero_factors: RawTable = serde_json::from_str(
            r#"{"fields": ["trade_date", "adj_factor"], "items": [["20240104", 0.0], ["20240103", 0]]}"#,
        )
        .expect("valid factors");

        for factors in [&no_factors, &zero_factors] {
            for adjustment in [Adjustment::Forward, Adjustment::Backward] {
                let mut table = bars();
                let result = adjust_prices(&mut table, factors, adjustment);
                assert!(
                    matches!(result, Err(ProviderError::MissingField(ref f)) if f == "adj_factor"),
                    "{:?}: {:?}",
                    adjustment,
                    result
                );
            }
        }
    }

    #[test]
    fn test_empty_bars_need_no_factors() {
        let mut table: RawTable =
            serde_json::from_str(r#"{"fields": ["trade_date", "close"], "items": []}"#).expect("valid bars");
        let no_factors: RawTable =
            serde_json::from_str(r#"{"fields": ["trade_date", "adj_factor"], "items": []}"#).expect("valid factors");

        adjust_prices(&mut table, &no_factors, Adjustment::Forward).expect("nothing to adjust");
        assert!(table.items.is_empty());
    }

    #[test]
    fn test_bars_api_selection() {
        assert_eq!(bars_api("E", "D").expect("daily"), "daily");
        assert_eq!(bars_api("E", "W").expect("weekly"), "weekly");
        assert_eq!(bars_api("I", "M").expect("index monthly"), "index_monthly");
        assert!(matches!(bars_api("E", "5min"), Err(ProviderError::Unsupported(_))));
    }

    #[test]
    fn test_adjustment_from_param() {
        assert_eq!(Adjustment::from_param("qfq"), Some(Adjustment::Forward));
        assert_eq!(Adjustment::from_param("hfq"), Some(Adjustment::Backward));
        assert_eq!(Adjustment::from_param("none"), None);
    }

    #[tokio::test]
    async fn test_unsupported_bar_options_fail_before_request() {
        // Unroutable endpoint: these must fail on validation, not on the network
        let client = TushareClient::new("token").with_base_url("http://127.0.0.1:9");

        let bad_adj = QueryParams::new().with("ts_code", "000001.SZ").with("adj", "xfq");
        assert!(matches!(
            client.fetch(Dataset::PriceBars, &bad_adj).await,
            Err(ProviderError::Unsupported(_))
        ));

        let index_adj = QueryParams::new()
            .with("ts_code", "000300.SH")
            .with("asset", "I")
            .with("adj", "qfq");
        assert!(matches!(
            client.fetch(Dataset::PriceBars, &index_adj).await,
            Err(ProviderError::Unsupported(_))
        ));
    }

    #[test]
    fn test_client_defaults() {
        let client = TushareClient::new("token");
        assert_eq!(client.base_url(), TUSHARE_API_URL);
    }
}
