//! Demonstration HTTP service built on top of [`priceflux::Engine`].
//!
//! Unlike the RPC-polling service this crate grew out of, there is no
//! external price feed here: a handful of illustrative ticks are fed to the
//! engine at startup (see [`seed_demo_ticks`]) purely so `/stats`, `/stats/
//! all`, and `/spikes` have something to show. Wiring a real feed in is a
//! matter of calling `engine.enqueue(..)` from wherever ticks arrive.

use std::sync::Arc;

use actix_web::{
    get,
    http::StatusCode,
    web::{Data, Query},
    App, HttpResponse, HttpResponseBuilder, HttpServer,
};
use chrono::Utc;
use priceflux::{Engine, EngineConfig, Tick};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

struct AppState {
    engine: Arc<Engine>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
struct SymbolQuery {
    symbol: String,
}

#[derive(Deserialize)]
struct SpikesQuery {
    symbol: Option<String>,
    #[serde(default = "default_spike_limit")]
    limit: usize,
}

fn default_spike_limit() -> usize {
    20
}

/// Health check endpoint.
#[get("/health")]
async fn health() -> HttpResponse {
    HttpResponseBuilder::new(StatusCode::OK)
        .body(serde_json::to_string(&HealthResponse { status: "ok" }).unwrap())
}

/// Statistics for a single symbol, or 204 if nothing has been observed
/// for it yet.
#[get("/stats")]
async fn stats_one(query: Query<SymbolQuery>, state: Data<AppState>) -> HttpResponse {
    match state.engine.try_get_statistics(&query.symbol) {
        Some(stats) => HttpResponseBuilder::new(StatusCode::OK)
            .body(serde_json::to_string(&stats).unwrap_or_default()),
        None => HttpResponseBuilder::new(StatusCode::NO_CONTENT).finish(),
    }
}

/// Statistics for every symbol the engine has observed a tick for.
#[get("/stats/all")]
async fn stats_all(state: Data<AppState>) -> HttpResponse {
    let all = state.engine.list_all_statistics();
    HttpResponseBuilder::new(StatusCode::OK).body(serde_json::to_string(&all).unwrap_or_default())
}

/// Recently detected spikes, optionally filtered to one symbol.
#[get("/spikes")]
async fn spikes(query: Query<SpikesQuery>, state: Data<AppState>) -> HttpResponse {
    let recent = state
        .engine
        .recent_spikes(query.limit, query.symbol.as_deref());
    HttpResponseBuilder::new(StatusCode::OK)
        .body(serde_json::to_string(&recent).unwrap_or_default())
}

/// Engine-wide counters and gauges.
#[get("/metrics")]
async fn metrics(state: Data<AppState>) -> HttpResponse {
    let snapshot = state.engine.metrics();
    HttpResponseBuilder::new(StatusCode::OK)
        .body(serde_json::to_string(&snapshot).unwrap_or_default())
}

/// Feeds a short, hand-picked sequence of ticks through the engine so the
/// demo has something to serve. Not a substitute for a real feed.
fn seed_demo_ticks(engine: &Engine) {
    let samples: &[(&str, &str)] = &[
        ("BTCUSD", "65000"),
        ("BTCUSD", "65010"),
        ("BTCUSD", "67500"),
        ("ETHUSD", "3400"),
        ("ETHUSD", "3395"),
        ("ETHUSD", "3200"),
    ];

    for (symbol, price) in samples {
        let price: Decimal = price.parse().expect("hardcoded demo price is valid");
        if let Err(err) = engine.enqueue(Tick::new(*symbol, price, Utc::now())) {
            tracing::warn!(%symbol, "failed to seed demo tick: {err}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let engine = Arc::new(Engine::new(EngineConfig::default())?);
    engine.start()?;
    seed_demo_ticks(&engine);

    tracing::info!("priceflux demo listening on 127.0.0.1:8080");

    let data = Data::new(AppState {
        engine: engine.clone(),
    });
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .service(health)
            .service(stats_one)
            .service(stats_all)
            .service(spikes)
            .service(metrics)
    })
    .bind(("127.0.0.1", 8080))?
    .run();

    server.await?;
    engine.stop().await?;
    Ok(())
}
