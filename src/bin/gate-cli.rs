use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Management CLI for the site gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Value sent as X-Health-Token.
    #[arg(short = 't', long, env = "HEALTH_CHECK_TOKEN")]
    health_token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness probe
    Live,
    /// Readiness probe with per-dependency outcomes
    Ready,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(token) = cli.health_token.as_deref().filter(|t| !t.is_empty()) {
        headers.insert("x-health-token", HeaderValue::from_str(token)?);
    }

    let path = match cli.command {
        Commands::Live => "/health/live",
        Commands::Ready => "/health/ready",
    };
    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    let healthy = print_response(res).await?;
    if !healthy {
        std::process::exit(1);
    }
    Ok(())
}

/// Pretty-print the body. Returns whether the gateway reported success.
async fn print_response(res: reqwest::Response) -> Result<bool, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }
    Ok(status.is_success())
}
