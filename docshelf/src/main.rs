use axum::{routing::get, serve, Router};
use clap::Parser;
use docshelf::api;
use docshelf_core::store::MemoryStore;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;


#[derive(Parser, Debug)]
#[command(name = "docshelf", about = "Document shelf API server")]
struct Args {
    /// Address to bind the HTTP listener to.
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let store = Arc::new(MemoryStore::new());

    let app = Router::new()
        .merge(api::router(store))
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = TcpListener::bind(&args.addr).await?;
    info!(addr = %args.addr, "listening");
    serve(listener, app.into_make_service()).await?;
    Ok(())
}
