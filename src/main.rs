//! static-edge
//!
//! Serves a static site from an object-storage origin the way a CDN edge
//! does, running the site's edge functions on every request.
//!
//! # Architecture Overview
//!
//! ```text
//!     Viewer request
//!     ──────────────▶ net ──▶ http server ──▶ viewer-request fn ──┬──▶ 301 redirect
//!                                                                  │
//!                                                                  ▼
//!                                                            origin fetch
//!                                                                  │
//!     Viewer response                                              ▼
//!     ◀──────────────────────────────────────── viewer-response fn (security headers)
//!
//!     Cross-cutting: config (+ hot reload), observability, resilience,
//!     lifecycle, admin API
//! ```

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "static-edge", version, about = "Static site edge runtime")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "STATIC_EDGE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    static_edge::lifecycle::run(args.config.as_deref()).await?;
    Ok(())
}
