use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "admin-cli")]
#[command(about = "Talks to the admin surface of a running server", long_about = None)]
struct Cli {
    /// Admin base URL, including the admin context path
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the server answers
    Ping,
    /// Run every health check
    Health,
    /// Run a task, passing key=value parameters
    Task {
        name: String,
        #[arg(value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Ping => client.get(format!("{}/ping", base)).send().await?,
        Commands::Health => client.get(format!("{}/healthcheck", base)).send().await?,
        Commands::Task { name, params } => {
            client
                .post(format!("{}/tasks/{}", base, name))
                .query(&params)
                .send()
                .await?
        }
    };
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: admin surface returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => print!("{}", text),
    }
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
