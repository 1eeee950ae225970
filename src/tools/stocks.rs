//! Stock-market tool definitions.
//!
//! Fifteen Polygon endpoints, stocks only. Each tool has one argument struct;
//! defaults live in the parameter definitions so the published schema and the
//! request builder cannot drift apart.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Number;

use crate::tools::catalog::{ParamDef, ParamType, ToolCatalog, ToolEntry, ToolHandler};
use crate::tools::request::ApiRequest;
use crate::types::Result;

/// Default page size for news and ticker search.
pub const DEFAULT_LIMIT: i64 = 10;
/// Default SMA window.
pub const DEFAULT_SMA_WINDOW: i64 = 50;
/// Default EMA window.
pub const DEFAULT_EMA_WINDOW: i64 = 12;
/// Default RSI window.
pub const DEFAULT_RSI_WINDOW: i64 = 14;

// =============================================================================
// Argument records
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct NoArgs {}

#[derive(Debug, Deserialize)]
pub struct TickerArgs {
    pub ticker: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustedTickerArgs {
    pub ticker: String,
    pub adjusted: bool,
}

#[derive(Debug, Deserialize)]
pub struct AggregatesArgs {
    pub ticker: String,
    #[serde(deserialize_with = "integral")]
    pub multiplier: i64,
    pub timespan: String,
    pub from_date: String,
    pub to_date: String,
    pub adjusted: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewsArgs {
    pub ticker: String,
    #[serde(deserialize_with = "integral")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct DailyOpenCloseArgs {
    pub ticker: String,
    pub date: String,
    pub adjusted: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    pub search: String,
    #[serde(deserialize_with = "integral")]
    pub limit: i64,
}

/// SMA, EMA and RSI share this shape; only the default window differs.
#[derive(Debug, Deserialize)]
pub struct WindowedIndicatorArgs {
    pub ticker: String,
    pub timespan: String,
    #[serde(deserialize_with = "integral")]
    pub window: i64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MacdArgs {
    pub ticker: String,
    pub timespan: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotArgs {
    #[serde(default)]
    pub tickers: Option<String>,
}

/// Accepts any JSON number with no fractional part, so `10.0` reads as `10`.
/// Range checks are left to the upstream API.
fn integral<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(D::Error::custom(format!("expected an integer, got {number}"))),
    }
}

// =============================================================================
// Parameter helpers
// =============================================================================

fn ticker(description: &str) -> ParamDef {
    ParamDef::required("ticker", ParamType::String, description)
}

fn adjusted(description: &str) -> ParamDef {
    ParamDef::optional("adjusted", ParamType::Boolean, description).with_default(true)
}

fn timestamp() -> ParamDef {
    ParamDef::optional("timestamp", ParamType::String, "Date (YYYY-MM-DD)")
}

fn indicator_timespan() -> ParamDef {
    ParamDef::required("timespan", ParamType::String, "day, week, month")
}

fn windowed_indicator(
    name: &str,
    description: &str,
    window_description: &str,
    default_window: i64,
    indicator: &'static str,
) -> ToolHandler {
    ToolHandler::new(
        ToolEntry::new(
            name,
            description,
            vec![
                ticker("Stock ticker"),
                timestamp(),
                ParamDef::optional("window", ParamType::Integer, window_description)
                    .with_default(default_window),
                indicator_timespan(),
            ],
        ),
        move |a: WindowedIndicatorArgs| {
            ApiRequest::new(["v1", "indicators", indicator])
                .segment(a.ticker)
                .query_opt("timestamp", a.timestamp)
                .query("timespan", a.timespan)
                .query("window", a.window)
        },
    )
}

// =============================================================================
// Catalog
// =============================================================================

/// Every stock tool, in published order.
pub fn stock_tools() -> Vec<ToolHandler> {
    vec![
        ToolHandler::new(
            ToolEntry::new(
                "get_stock_price",
                "Get the current/latest stock price for a ticker symbol",
                vec![ticker("Stock ticker symbol (e.g., AAPL, TSLA, MSFT)")],
            ),
            |a: TickerArgs| ApiRequest::new(["v2", "aggs", "ticker"]).segment(a.ticker).segment("prev"),
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_previous_close",
                "Get previous day's OHLC (open, high, low, close) for a stock",
                vec![
                    ticker("Stock ticker symbol"),
                    adjusted("Adjusted for splits (default: true)"),
                ],
            ),
            |a: AdjustedTickerArgs| {
                ApiRequest::new(["v2", "aggs", "ticker"])
                    .segment(a.ticker)
                    .segment("prev")
                    .query("adjusted", a.adjusted)
            },
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_aggregates",
                "Get historical price bars/candles for a stock over a date range",
                vec![
                    ticker("Stock ticker"),
                    ParamDef::required("multiplier", ParamType::Integer, "Size of timespan (e.g., 1)"),
                    ParamDef::required(
                        "timespan",
                        ParamType::String,
                        "Size of time window: minute, hour, day, week, month, quarter, year",
                    ),
                    ParamDef::required("from_date", ParamType::String, "Start date (YYYY-MM-DD)"),
                    ParamDef::required("to_date", ParamType::String, "End date (YYYY-MM-DD)"),
                    adjusted("Adjusted for splits"),
                ],
            ),
            |a: AggregatesArgs| {
                ApiRequest::new(["v2", "aggs", "ticker"])
                    .segment(a.ticker)
                    .segment("range")
                    .segment(a.multiplier.to_string())
                    .segment(a.timespan)
                    .segment(a.from_date)
                    .segment(a.to_date)
                    .query("adjusted", a.adjusted)
            },
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_ticker_details",
                "Get detailed company information for a stock ticker",
                vec![ticker("Stock ticker symbol")],
            ),
            |a: TickerArgs| ApiRequest::new(["v3", "reference", "tickers"]).segment(a.ticker),
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_ticker_news",
                "Get latest news articles for a stock ticker",
                vec![
                    ticker("Stock ticker symbol"),
                    ParamDef::optional("limit", ParamType::Integer, "Number of articles (default: 10)")
                        .with_default(DEFAULT_LIMIT),
                ],
            ),
            |a: NewsArgs| {
                ApiRequest::new(["v2", "reference", "news"])
                    .query("ticker", a.ticker)
                    .query("limit", a.limit)
            },
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_market_status",
                "Get current market status (open/closed) and upcoming holidays",
                vec![],
            ),
            |_: NoArgs| ApiRequest::new(["v1", "marketstatus", "now"]),
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_dividends",
                "Get dividend history for a stock",
                vec![ticker("Stock ticker symbol")],
            ),
            |a: TickerArgs| ApiRequest::new(["v3", "reference", "dividends"]).query("ticker", a.ticker),
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_stock_splits",
                "Get stock split history for a ticker",
                vec![ticker("Stock ticker symbol")],
            ),
            |a: TickerArgs| ApiRequest::new(["v3", "reference", "splits"]).query("ticker", a.ticker),
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_daily_open_close",
                "Get open, high, low, close for a specific date",
                vec![
                    ticker("Stock ticker"),
                    ParamDef::required("date", ParamType::String, "Date (YYYY-MM-DD)"),
                    adjusted("Adjusted for splits"),
                ],
            ),
            |a: DailyOpenCloseArgs| {
                ApiRequest::new(["v1", "open-close"])
                    .segment(a.ticker)
                    .segment(a.date)
                    .query("adjusted", a.adjusted)
            },
        ),
        ToolHandler::new(
            ToolEntry::new(
                "search_tickers",
                "Search for stock ticker symbols by company name or keyword",
                vec![
                    ParamDef::required(
                        "search",
                        ParamType::String,
                        "Search query (company name or keyword)",
                    ),
                    ParamDef::optional("limit", ParamType::Integer, "Max results (default: 10)")
                        .with_default(DEFAULT_LIMIT),
                ],
            ),
            |a: SearchArgs| {
                ApiRequest::new(["v3", "reference", "tickers"])
                    .query("search", a.search)
                    .query("limit", a.limit)
                    .query("market", "stocks")
            },
        ),
        windowed_indicator(
            "get_sma",
            "Get Simple Moving Average (SMA) technical indicator",
            "Window size (e.g., 50 for 50-day SMA)",
            DEFAULT_SMA_WINDOW,
            "sma",
        ),
        windowed_indicator(
            "get_ema",
            "Get Exponential Moving Average (EMA) technical indicator",
            "Window size (e.g., 12 for 12-day EMA)",
            DEFAULT_EMA_WINDOW,
            "ema",
        ),
        windowed_indicator(
            "get_rsi",
            "Get Relative Strength Index (RSI) technical indicator",
            "Window size (default: 14)",
            DEFAULT_RSI_WINDOW,
            "rsi",
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_macd",
                "Get MACD (Moving Average Convergence Divergence) indicator",
                vec![ticker("Stock ticker"), timestamp(), indicator_timespan()],
            ),
            |a: MacdArgs| {
                ApiRequest::new(["v1", "indicators", "macd"])
                    .segment(a.ticker)
                    .query_opt("timestamp", a.timestamp)
                    .query("timespan", a.timespan)
            },
        ),
        ToolHandler::new(
            ToolEntry::new(
                "get_snapshot_all_tickers",
                "Get snapshot of all tickers (current prices, volume, etc.)",
                vec![ParamDef::optional(
                    "tickers",
                    ParamType::String,
                    "Comma-separated ticker list (optional)",
                )],
            ),
            |a: SnapshotArgs| {
                let request =
                    ApiRequest::new(["v2", "snapshot", "locale", "us", "markets", "stocks", "tickers"]);
                match a.tickers.filter(|t| !t.is_empty()) {
                    Some(tickers) => request.segment(tickers),
                    None => request,
                }
            },
        ),
    ]
}

/// Build the catalog of stock tools.
pub fn stock_catalog() -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog::new();
    for handler in stock_tools() {
        catalog.register(handler)?;
    }
    Ok(catalog)
}
