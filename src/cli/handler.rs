use anyhow::{Context, Result};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use quickbooks_client::api::codec::json;
use quickbooks_client::auth::{BackendKind, Credential, CredentialStore, FileCredentialStore, ProtocolVersion};
use quickbooks_client::{ClientConfig, ObjectTree, QuickbooksClient};

use super::{Cli, Commands, CredentialCommands, OutputFormat};

pub async fn run(cli: Cli) -> Result<()> {
    let store = Arc::new(match &cli.store {
        Some(path) => FileCredentialStore::new(path),
        None => FileCredentialStore::open_default()?,
    });

    if let Commands::Credentials(command) = &cli.command {
        return handle_credentials(command, &store, &cli.owner).await;
    }

    let config = match &cli.config {
        Some(path) => ClientConfig::load(path)?.with_overrides(|name| std::env::var(name).ok()),
        None => ClientConfig::load_default()?,
    };

    let client = QuickbooksClient::from_store(store, &cli.owner, &config)
        .await
        .with_context(|| format!("Failed to build client for owner '{}'", cli.owner))?;
    info!("Running command for owner {}", cli.owner);

    match cli.command {
        Commands::Get { object_type, id } => print_tree(&client.get(&object_type, &id).await?, cli.format),
        Commands::Read { object_type } => print_trees(&client.read(&object_type).await?, cli.format),
        Commands::Search { object_type, predicates } => {
            print_trees(&client.search(&object_type, predicates).await?, cli.format)
        }
        Commands::Create(args) => {
            let tree = read_tree(&args.file)?;
            print_tree(&client.create(&args.object_type, tree).await?, cli.format)
        }
        Commands::Update(args) => {
            let tree = read_tree(&args.file)?;
            print_tree(&client.update(&args.object_type, tree).await?, cli.format)
        }
        Commands::Delete(args) => {
            let tree = read_tree(&args.file)?;
            print_tree(&client.delete(&args.object_type, tree).await?, cli.format)
        }
        Commands::Query { statement } => print_trees(&client.query(&statement).await?, cli.format),
        Commands::AppMenu => {
            println!("{}", client.app_menu().await?);
            Ok(())
        }
        Commands::Disconnect => print_tree(&client.disconnect().await?, cli.format),
        Commands::Credentials(_) => Ok(()),
    }
}

async fn handle_credentials(command: &CredentialCommands, store: &FileCredentialStore, owner: &str) -> Result<()> {
    match command {
        CredentialCommands::Add {
            access_key,
            access_secret,
            tenant,
            backend,
            protocol,
        } => {
            let backend: BackendKind = backend.parse()?;
            let protocol: ProtocolVersion = protocol.parse()?;
            let credential = Credential::new(access_key, access_secret, tenant, backend, protocol);
            store.save(owner, credential).await?;
            println!("Stored {} {} credential for '{}' in {:?}", backend, protocol, owner, store.path());
        }
        CredentialCommands::Remove => {
            store.invalidate(owner).await?;
            println!("Removed credential for '{}'", owner);
        }
        CredentialCommands::List => {
            for name in store.owners().await? {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn read_tree(path: &Path) -> Result<ObjectTree> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read object file: {:?}", path))?;
    json::decode(&content).with_context(|| format!("Object file {:?} is not a JSON object", path))
}

fn print_tree(tree: &ObjectTree, format: OutputFormat) -> Result<()> {
    print_value(&json::to_value(tree), format)
}

fn print_trees(trees: &[ObjectTree], format: OutputFormat) -> Result<()> {
    print_value(&Value::Array(trees.iter().map(json::to_value).collect()), format)
}

fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::JsonCompact => serde_json::to_string(value)?,
    };
    println!("{}", rendered);
    Ok(())
}
