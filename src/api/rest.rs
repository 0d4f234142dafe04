// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   GET /api/v1/health      liveness + whether a dataset exists
//   GET /api/v1/chart-data  candles, every indicator, levels, cache metadata
//   GET /api/v1/ohlc        trailing candles without volume
//   GET /api/v1/price       current quote
//   GET /api/v1/volume-analysis?lookback=N  volume spike statistics + signals
//   POST /api/v1/cache/invalidate  drop the in-memory dataset
//
// CORS is permissive; the chart front-end is served from another origin.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::api::payload::{no_data_body, ChartPayload, OhlcRow};
use crate::app_state::{AppState, Sources};
use crate::indicators::volume_analysis::{
    analyze_volume, clamp_lookback, LiveVolume, VolumeAnalysis,
};
use crate::types::now_secs;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router<X: Sources>(state: Arc<AppState<X>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health::<X>))
        .route("/api/v1/chart-data", get(chart_data::<X>))
        .route("/api/v1/ohlc", get(ohlc::<X>))
        .route("/api/v1/price", get(price::<X>))
        .route("/api/v1/volume-analysis", get(volume_analysis::<X>))
        .route("/api/v1/cache/invalidate", post(invalidate::<X>))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    has_dataset: bool,
}

async fn health<X: Sources>(State(state): State<Arc<AppState<X>>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.uptime_secs(),
        has_dataset: state.cache.has_entry(),
    })
}

// =============================================================================
// Chart data
// =============================================================================

async fn chart_data<X: Sources>(State(state): State<Arc<AppState<X>>>) -> Response {
    match state.cache.get(Utc::now()).await {
        Ok(hit) => Json(ChartPayload::from_hit(
            &hit,
            &state.config.symbol,
            &state.config.timeframe,
        ))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "chart data requested but none available");
            (StatusCode::SERVICE_UNAVAILABLE, Json(no_data_body())).into_response()
        }
    }
}

// =============================================================================
// OHLC
// =============================================================================

async fn ohlc<X: Sources>(State(state): State<Arc<AppState<X>>>) -> impl IntoResponse {
    let series = state.cache.ohlc().get_series(now_secs()).await;
    let rows: Vec<OhlcRow> = series
        .tail(state.config.ohlc_response_limit)
        .iter()
        .map(OhlcRow::without_volume)
        .collect();
    Json(rows)
}

// =============================================================================
// Price
// =============================================================================

async fn price<X: Sources>(State(state): State<Arc<AppState<X>>>) -> impl IntoResponse {
    Json(state.quotes.current().await)
}

// =============================================================================
// Volume analysis
// =============================================================================

#[derive(Debug, Deserialize)]
struct VolumeQuery {
    lookback: Option<i64>,
}

#[derive(Serialize)]
struct VolumeAnalysisResponse {
    #[serde(flatten)]
    analysis: VolumeAnalysis,
    timestamp: String,
}

async fn volume_analysis<X: Sources>(
    State(state): State<Arc<AppState<X>>>,
    Query(query): Query<VolumeQuery>,
) -> Response {
    let lookback = clamp_lookback(query.lookback);
    let series = state.cache.ohlc().get_series(now_secs()).await;

    // Only the primary ticker's rolling 24h volume is comparable with the
    // daily candle volumes.
    let quote = state.quotes.current().await;
    let live = (!quote.stale
        && quote.source == state.quotes.primary_name()
        && quote.quote.volume_24h > 0.0
        && quote.quote.price > 0.0)
        .then_some(LiveVolume {
            volume_usd: quote.quote.volume_24h,
            price: quote.quote.price,
        });

    match analyze_volume(series.as_slice(), lookback, live) {
        Ok(analysis) => Json(VolumeAnalysisResponse {
            analysis,
            timestamp: Utc::now().to_rfc3339(),
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "volume analysis unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string(), "spike": null })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Cache control
// =============================================================================

async fn invalidate<X: Sources>(State(state): State<Arc<AppState<X>>>) -> impl IntoResponse {
    state.cache.invalidate();
    info!("in-memory dataset invalidated");
    Json(serde_json::json!({ "invalidated": true }))
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::market_data::{Quote, QuoteSource};
    use crate::runtime_config::RuntimeConfig;
    use crate::store::ohlc_store::tests::{candles, MockOhlc};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct FixedQuote(&'static str, Option<f64>);

    impl QuoteSource for FixedQuote {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn fetch_quote(&self) -> Result<Quote, SourceError> {
            self.1
                .map(|price| Quote {
                    price,
                    change_24h: 1.5,
                    volume_24h: 1_000.0,
                })
                .ok_or_else(|| SourceError::unavailable(self.0, "down"))
        }
    }

    struct TestSources;

    impl Sources for TestSources {
        type Ohlc = MockOhlc;
        type OhlcFallback = MockOhlc;
        type Quote = FixedQuote;
        type QuoteFallback = FixedQuote;
    }

    fn app(primary: MockOhlc) -> Router {
        app_with_quotes(primary, FixedQuote("ticker", None))
    }

    fn app_with_quotes(primary: MockOhlc, quote: FixedQuote) -> Router {
        let mut config = RuntimeConfig::default();
        config.serverless = true;
        config.ohlc_response_limit = 30;
        app_with_config(config, primary, quote)
    }

    fn app_with_config(config: RuntimeConfig, primary: MockOhlc, quote: FixedQuote) -> Router {
        let state = AppState::<TestSources>::new(
            config,
            primary,
            MockOhlc::failing("s"),
            quote,
            FixedQuote("backup", Some(42_000.0)),
        );
        router(Arc::new(state))
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let resp = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (status, body) = get_json(app(MockOhlc::failing("p")), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["has_dataset"], false);
    }

    #[tokio::test]
    async fn chart_data_serves_dataset() {
        let (status, body) = get_json(
            app(MockOhlc::new("p", candles(0..120, 100.0))),
            "/api/v1/chart-data",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ohlc"].as_array().unwrap().len(), 120);
        assert_eq!(body["meta"]["symbol"], "BTC/USD");
        assert_eq!(body["meta"]["cache_tier"], "rebuilt");
        assert!(body["indicators"]["rsi"].is_array());
    }

    #[tokio::test]
    async fn chart_data_without_data_is_503() {
        let (status, body) = get_json(app(MockOhlc::failing("p")), "/api/v1/chart-data").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "No data available");
        assert!(body["ohlc"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ohlc_returns_trailing_candles_without_volume() {
        let (status, body) = get_json(
            app(MockOhlc::new("p", candles(0..100, 100.0))),
            "/api/v1/ohlc",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 30);
        assert_eq!(rows[29]["time"], 99 * 86_400);
        assert!(rows[0].get("volume").is_none());
    }

    #[tokio::test]
    async fn invalidate_drops_memory_entry() {
        let router = app(MockOhlc::new("p", candles(0..60, 100.0)));
        let (status, _) = get_json(router.clone(), "/api/v1/chart-data").await;
        assert_eq!(status, StatusCode::OK);
        let (_, health) = get_json(router.clone(), "/api/v1/health").await;
        assert_eq!(health["has_dataset"], true);

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/cache/invalidate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let (_, health) = get_json(router, "/api/v1/health").await;
        assert_eq!(health["has_dataset"], false);
    }

    #[tokio::test]
    async fn price_falls_back_to_secondary_quote() {
        let (status, body) = get_json(app(MockOhlc::failing("p")), "/api/v1/price").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["price"], 42_000.0);
        assert_eq!(body["stale"], false);
    }

    #[tokio::test]
    async fn volume_analysis_clamps_lookback() {
        let (status, body) = get_json(
            app(MockOhlc::new("p", candles(0..40, 100.0))),
            "/api/v1/volume-analysis?lookback=3",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lookback_days"], 7);
        // Backup quote is not a live volume reading; the last candle is used.
        assert_eq!(body["spike"]["current_volume"], 100.0);
        assert_eq!(body["spike"]["z_score"], 0.0);
        assert_eq!(body["spike"]["volume_ratio"], 1.0);
        assert_eq!(body["spike"]["spike_level"], "normal");
        assert_eq!(body["spike"]["volume_history"].as_array().unwrap().len(), 8);
        assert!(body["realtime_signals"]["buy_pressure"]["ratio"].is_number());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn volume_analysis_uses_live_primary_volume() {
        let router = app_with_quotes(
            MockOhlc::new("p", candles(0..40, 100.0)),
            FixedQuote("ticker", Some(100.0)),
        );
        let (status, body) = get_json(router, "/api/v1/volume-analysis").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["lookback_days"], 14);
        assert_eq!(body["spike"]["current_volume"], 1_000.0);
        assert_eq!(body["spike"]["volume_ratio"], 10.0);
        assert_eq!(body["realtime_signals"]["volume_breakout"]["is_breakout"], true);
    }

    #[tokio::test]
    async fn volume_analysis_without_candles_is_503() {
        let (status, body) =
            get_json(app(MockOhlc::failing("p")), "/api/v1/volume-analysis").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["spike"].is_null());
        assert!(body["error"].as_str().unwrap().contains("insufficient data"));
    }

    #[tokio::test]
    async fn freshness_window_comes_from_config() {
        let mut config = RuntimeConfig::default();
        config.serverless = true;
        config.freshness_secs = 0;
        let router = app_with_config(
            config,
            MockOhlc::new("p", candles(0..60, 100.0)),
            FixedQuote("ticker", None),
        );

        let (_, first) = get_json(router.clone(), "/api/v1/chart-data").await;
        assert_eq!(first["meta"]["cache_tier"], "rebuilt");
        // A zero-second window never serves from memory.
        let (_, second) = get_json(router, "/api/v1/chart-data").await;
        assert_eq!(second["meta"]["cache_tier"], "rebuilt");
    }
}
