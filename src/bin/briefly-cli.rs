use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, ORIGIN};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "briefly-cli")]
#[command(about = "Operator CLI for the Briefly gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Session access token, sent as the access cookie.
    #[arg(short, long, env = "BRIEFLY_ACCESS_TOKEN")]
    token: Option<String>,

    #[arg(long, default_value = "sb-access-token")]
    cookie_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Show who the session belongs to
    Whoami,
    /// Show the session's usage snapshot
    Usage,
    /// Operator monitoring view (admin session required)
    Monitoring,
    /// Send a CORS preflight and show the headers that come back
    Preflight {
        path: String,
        #[arg(long)]
        origin: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()?;

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(COOKIE, HeaderValue::from_str(&format!("{}={}", cli.cookie_name, token))?);
    }

    let base = cli.url.trim_end_matches('/');
    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{}/health", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Whoami => {
            let res = client
                .get(format!("{}/api/auth/refresh", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Usage => {
            let res = client.get(format!("{}/api/usage", base)).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Monitoring => {
            let res = client
                .get(format!("{}/api/admin/monitoring", base))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Preflight { path, origin } => {
            let res = client
                .request(Method::OPTIONS, format!("{}{}", base, path))
                .header(ORIGIN, origin)
                .header("access-control-request-method", "POST")
                .send()
                .await?;
            let cors: serde_json::Map<String, Value> = res
                .headers()
                .iter()
                .filter(|(name, _)| name.as_str().starts_with("access-control-") || name.as_str() == "vary")
                .map(|(name, value)| (name.to_string(), json!(value.to_str().unwrap_or_default())))
                .collect();
            let report = json!({ "status": res.status().as_u16(), "headers": cors });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
