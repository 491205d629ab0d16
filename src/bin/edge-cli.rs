use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use static_edge::config::{load_config, EdgeConfig, FunctionsConfig};
use static_edge::edge::{EdgeEvent, FunctionAssociations, Phase};
use static_edge::stack::StackPlan;

#[derive(Parser)]
#[command(name = "edge-cli")]
#[command(about = "Run edge functions, print provisioning plans, query the admin API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct AdminArgs {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "STATIC_EDGE_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured function for one phase against an event
    Invoke {
        #[arg(long)]
        phase: Phase,

        /// Edge configuration (defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Event JSON file (stdin when omitted)
        #[arg(long)]
        event: Option<PathBuf>,
    },
    /// Print the provisioning plan for a domain
    Plan {
        #[arg(long)]
        domain: String,

        #[arg(long)]
        no_viewer_request: bool,

        #[arg(long)]
        no_viewer_response: bool,
    },
    /// Check edge system status
    Status(AdminArgs),
    /// Show the active site configuration
    Site(AdminArgs),
    /// Show request counters
    Stats(AdminArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Invoke { phase, config, event } => invoke(phase, config, event)?,
        Commands::Plan {
            domain,
            no_viewer_request,
            no_viewer_response,
        } => {
            let functions = FunctionsConfig {
                viewer_request: !no_viewer_request,
                viewer_response: !no_viewer_response,
            };
            let plan = StackPlan::for_domain(&domain, &functions)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Commands::Status(args) => admin_get(&args, "status").await?,
        Commands::Site(args) => admin_get(&args, "site").await?,
        Commands::Stats(args) => admin_get(&args, "stats").await?,
    }

    Ok(())
}

fn invoke(
    phase: Phase,
    config: Option<PathBuf>,
    event: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config {
        Some(path) => load_config(&path)?,
        None => EdgeConfig::default(),
    };

    let raw = match event {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            raw
        }
    };

    let mut event: EdgeEvent = serde_json::from_str(&raw)?;
    event.context.event_type = phase;

    let functions = FunctionAssociations::from_config(&config.site, &config.functions);
    let result = functions.invoke(event)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn admin_get(args: &AdminArgs, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", args.key))?,
    );

    let res = reqwest::Client::new()
        .get(format!("{}/admin/{}", args.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("{}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
