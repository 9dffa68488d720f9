use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use irrigation_console::api::{ManagementApi, NodeApi};
use irrigation_console::assembler::{normalize_id, NodeDraft};
use irrigation_console::config::{self, Config};
use irrigation_console::draft::DraftFile;
use irrigation_console::http::HttpClient;
use irrigation_console::repository::{NodeRepository, NodeSummary};
use irrigation_console::session::Session;
use irrigation_console::wizard::{Wizard, WizardOutcome};

/// Irrigation console: list, create, edit and delete node configurations
#[derive(Parser, Debug)]
#[command(name = "irrigation-console")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every node with its role, addresses and thresholds
    Nodes,
    /// List farms and the zones inside each
    Farms,
    /// Create a node from a draft file, creating its farm and zone if needed
    Create {
        /// TOML draft file
        #[arg(long)]
        draft: String,
    },
    /// Edit an existing node with the keys present in a draft file
    Edit {
        node_id: String,
        #[arg(long)]
        draft: String,
    },
    /// Delete a node
    Delete { node_id: String },
    /// Print a draft file pre-filled with the new-node defaults
    Template,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ── Config ──────────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "console.toml".to_string());
    let mut cfg = config::load_or_default(&config_path)?;
    cfg.apply_env();
    cfg.validate().context("invalid configuration after environment overrides")?;

    match cli.command {
        Commands::Template => print_template(&cfg),
        command => {
            let client = connect(&cfg).await?;
            let result = run(&client, &cfg, command).await;
            client.logout().await;
            result
        }
    }
}

async fn connect(cfg: &Config) -> Result<HttpClient> {
    let client = HttpClient::from_config(&cfg.api, Session::anonymous())?;
    match (env::var("API_USERNAME"), env::var("API_PASSWORD")) {
        (Ok(user), Ok(pass)) => {
            client.login(&user, &pass).await.context("login failed")?;
            info!(user = %user, "logged in");
        }
        _ => warn!("API_USERNAME/API_PASSWORD not set, continuing without a session"),
    }
    Ok(client)
}

async fn run(client: &HttpClient, cfg: &Config, command: Commands) -> Result<()> {
    match command {
        Commands::Nodes => list_nodes(client).await,
        Commands::Farms => list_farms(client).await,
        Commands::Create { draft } => create_node(client, cfg, &draft).await,
        Commands::Edit { node_id, draft } => edit_node(client, cfg, &node_id, &draft).await,
        Commands::Delete { node_id } => delete_node(client, &node_id).await,
        Commands::Template => print_template(cfg),
    }
}

fn print_template(cfg: &Config) -> Result<()> {
    let draft = NodeDraft::from_defaults(&cfg.defaults);
    print!("{}", DraftFile::template(&draft)?);
    Ok(())
}

async fn list_nodes(client: &HttpClient) -> Result<()> {
    let repo = NodeRepository::load(client).await?;
    if repo.is_empty() {
        println!("no nodes configured");
    }
    for doc in repo.iter() {
        println!("{}", NodeSummary::from(doc));
    }
    Ok(())
}

async fn list_farms(client: &HttpClient) -> Result<()> {
    for farm in client.list_farms().await? {
        println!("{} ({})", farm.farm_id, farm.name);
        for zone in client.list_zones(&farm.farm_id).await? {
            println!("  {} ({})", zone.zone_id, zone.name);
        }
    }
    Ok(())
}

async fn create_node(client: &HttpClient, cfg: &Config, path: &str) -> Result<()> {
    let file = DraftFile::load(path)?;
    let (Some(farm), Some(zone)) = (&file.farm, &file.zone) else {
        bail!("draft {path} must name a farm and a zone");
    };

    let mut wizard = Wizard::create(&cfg.defaults);
    wizard.open(client).await?;

    // ── Step 1: farm ────────────────────────────────────────────────
    let farm_id = normalize_id(farm);
    if wizard.hierarchy().farms().iter().any(|f| f.farm_id == farm_id) {
        wizard.select_farm(client, &farm_id).await?;
    } else {
        wizard.create_farm(client, &farm_id).await?;
    }
    wizard.next()?;

    // ── Step 2: zone ────────────────────────────────────────────────
    let zone_id = normalize_id(zone);
    if wizard.hierarchy().zones().iter().any(|z| z.zone_id == zone_id) {
        wizard.select_zone(&zone_id)?;
    } else {
        wizard.create_zone(client, &zone_id).await?;
    }
    wizard.next()?;

    // ── Step 3: node ────────────────────────────────────────────────
    file.apply_to(wizard.draft_mut());
    save(client, wizard).await
}

async fn edit_node(client: &HttpClient, cfg: &Config, node_id: &str, path: &str) -> Result<()> {
    let file = DraftFile::load(path)?;
    let repo = NodeRepository::load(client).await?;
    let node_id = node_id.trim();
    let doc = repo.get(node_id).or_else(|| {
        repo.iter()
            .find(|n| normalize_id(&n.identity.node_id) == normalize_id(node_id))
    });
    let Some(doc) = doc else {
        bail!("node {node_id} not found");
    };

    let mut wizard = Wizard::edit(doc, &cfg.defaults);
    wizard.open(client).await?;
    if file.farm.is_some() || file.zone.is_some() {
        warn!(node_id = %node_id, "farm and zone of an existing node are fixed, ignoring them");
    }
    file.apply_to(wizard.draft_mut());
    save(client, wizard).await
}

async fn save(client: &HttpClient, mut wizard: Wizard) -> Result<()> {
    if let Err(err) = wizard.submit(client).await {
        for (block, msg) in wizard.block_errors().iter() {
            eprintln!("  {block}: {msg}");
        }
        return Err(err.into());
    }
    if let WizardOutcome::Saved(doc) = wizard.finish() {
        println!("{}", NodeSummary::from(&doc));
    }
    Ok(())
}

async fn delete_node(client: &HttpClient, node_id: &str) -> Result<()> {
    let node_id = node_id.trim();
    client.delete_node(node_id).await?;
    println!("deleted {node_id}");
    Ok(())
}
