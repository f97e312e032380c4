use clap::{Parser, Subcommand};
use reqwest::Method;
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "Operator CLI for the configuration registry", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check registry status
    Status,
    /// List every service with its full configuration
    Services,
    /// List service names
    Names,
    /// Show one service
    Show { service: String },
    /// Show a service's variable definitions
    Definitions { service: String },
    /// Show global variables, or one of them
    Get { service: String, key: Option<String> },
    /// Set a global variable; VALUE is parsed as JSON, falling back to a string
    Set { service: String, key: String, value: String },
    /// List a service's replicas
    Replicas { service: String },
    /// Show a replica's variables, or one of them
    GetReplica {
        service: String,
        replica: String,
        key: Option<String>,
    },
    /// Set a replica variable
    SetReplica {
        service: String,
        replica: String,
        key: String,
        value: String,
    },
    /// Delete a service
    DeleteService { service: String },
    /// Delete one replica of a service
    DeleteReplica { service: String, replica: String },
    /// Send a heartbeat on behalf of a replica
    Heartbeat { service: String, replica: String },
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let (method, path, body) = match cli.command {
        Commands::Status => (Method::GET, "/healthz".to_string(), None),
        Commands::Services => (Method::GET, "/configuration".to_string(), None),
        Commands::Names => (Method::GET, "/configuration/names".to_string(), None),
        Commands::Show { service } => (Method::GET, format!("/configuration/{}", service), None),
        Commands::Definitions { service } => {
            (Method::GET, format!("/configuration/{}/defined-variables", service), None)
        }
        Commands::Get { service, key: None } => (Method::GET, format!("/configuration/{}/variables", service), None),
        Commands::Get { service, key: Some(key) } => (
            Method::GET,
            format!("/configuration/{}/variables/{}", service, key),
            None,
        ),
        Commands::Set { service, key, value } => (
            Method::PUT,
            format!("/configuration/{}/variables/{}", service, key),
            Some(json!({ "value": parse_value(&value) })),
        ),
        Commands::Replicas { service } => (Method::GET, format!("/configuration/{}/replicas", service), None),
        Commands::GetReplica { service, replica, key } => {
            let path = match key {
                Some(key) => format!("/configuration/{}/replicas/{}/variables/{}", service, replica, key),
                None => format!("/configuration/{}/replicas/{}/variables", service, replica),
            };
            (Method::GET, path, None)
        }
        Commands::SetReplica {
            service,
            replica,
            key,
            value,
        } => (
            Method::PUT,
            format!("/configuration/{}/replicas/{}/variables/{}", service, replica, key),
            Some(json!({ "value": parse_value(&value) })),
        ),
        Commands::DeleteService { service } => (Method::DELETE, format!("/configuration/{}", service), None),
        Commands::DeleteReplica { service, replica } => (
            Method::DELETE,
            format!("/configuration/{}/replicas/{}", service, replica),
            None,
        ),
        Commands::Heartbeat { service, replica } => (
            Method::POST,
            "/events/heartbeat".to_string(),
            Some(json!({ "serviceName": service, "replicaId": replica })),
        ),
    };

    let mut request = client.request(method, format!("{}{}", base, path));
    if let Some(body) = body {
        request = request.json(&body);
    }
    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: registry returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    if text.is_empty() {
        println!("{}", status);
        return Ok(());
    }
    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
