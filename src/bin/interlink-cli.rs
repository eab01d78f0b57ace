use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "interlink-cli")]
#[command(about = "Management CLI for the interlink admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "INTERLINK_API_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full health report with every dependency
    Health,
    /// Readiness as seen by an orchestrator
    Ready,
    /// List all circuit breakers
    Breakers,
    /// Show one circuit breaker
    Breaker { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let path = match &cli.command {
        Commands::Health => "/health/detailed".to_string(),
        Commands::Ready => "/health/ready".to_string(),
        Commands::Breakers => "/admin/breakers".to_string(),
        Commands::Breaker { name } => format!("/admin/breakers/{}", name),
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    // Health endpoints answer 503 with a JSON report worth printing
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }

    if !status.is_success() {
        eprintln!("Error: admin API returned status {}", status);
        std::process::exit(1);
    }
    Ok(())
}
