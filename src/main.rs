use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use kakaki::config::DEFAULT_CONFIG_FILE;
use kakaki::{LocalClient, ObjectClient, ObjectStore, StoreConfig, UploadInput};

#[derive(Parser)]
#[command(name = "kakaki")]
#[command(about = "Upload, download and manage objects in an S3 bucket")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, help = "Config file path (JSON or TOML)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Bucket name (overrides config)")]
    bucket: Option<String>,

    #[arg(long, help = "Use a local directory as the object store instead of S3")]
    local: Option<PathBuf>,

    #[arg(long, help = "Output as JSON")]
    json: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    GenerateConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_FILE, help = "Config file path")]
        output: PathBuf,
    },
    #[command(flatten)]
    Object(ObjectCommand),
}

/// Commands that talk to the object store.
#[derive(clap::Subcommand)]
enum ObjectCommand {
    /// Upload a local file, or stdin when the source is "-"
    Upload {
        source: String,
        #[arg(long, help = "Object key (defaults to the file name)")]
        key: Option<String>,
    },
    /// Download an object into a directory
    Download {
        key: String,
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Write an object to stdout
    Cat { key: String },
    Exists { key: String },
    Info { key: String },
    Delete { key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kakaki=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = match cli.command {
        Commands::GenerateConfig { output } => {
            StoreConfig::default().save(&output)?;
            if cli.json {
                println!("{}", serde_json::json!({ "config": output }));
            } else {
                println!("Wrote config template to {}", output.display());
            }
            return Ok(());
        }
        Commands::Object(command) => command,
    };

    if let Some(root) = &cli.local {
        let bucket = cli.bucket.clone().context("--bucket is required with --local")?;
        let store = ObjectStore::new(LocalClient::new(root));
        return run(&store, &bucket, command, cli.json).await;
    }

    let config_path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = StoreConfig::load(&config_path)
        .with_context(|| format!("cannot start without a valid config ({})", config_path.display()))?;

    let bucket = match cli.bucket.or_else(|| config.bucket.clone()) {
        Some(bucket) => bucket,
        None => bail!("no bucket given: pass --bucket or set `bucket` in the config"),
    };

    let store = ObjectStore::from_config(&config)?;
    run(&store, &bucket, command, cli.json).await
}

async fn run<C: ObjectClient>(
    store: &ObjectStore<C>,
    bucket: &str,
    command: ObjectCommand,
    json: bool,
) -> Result<()> {
    match command {
        ObjectCommand::Upload { source, key } => {
            let (input, key) = if source == "-" {
                let key = key.context("--key is required when uploading from stdin")?;
                (UploadInput::reader(tokio::io::stdin()), key)
            } else {
                let path = PathBuf::from(&source);
                let key = match key {
                    Some(key) => key,
                    None => path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .context("cannot derive a key from the source path, pass --key")?,
                };
                (UploadInput::Path(path), key)
            };

            let receipt = store.upload(input, &key, bucket).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("Uploaded {}/{}", receipt.bucket, receipt.key);
                if let Some(etag) = &receipt.etag {
                    println!("   ETag: {}", etag);
                }
            }
        }
        ObjectCommand::Download { key, output } => {
            let path = store.download_to_file(&key, bucket, &output).await?;
            if json {
                println!("{}", serde_json::json!({ "key": key, "path": path }));
            } else {
                println!("Downloaded {} to {}", key, path.display());
            }
        }
        ObjectCommand::Cat { key } => {
            let mut reader = store.download_to_stream(&key, bucket).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
        }
        ObjectCommand::Exists { key } => {
            let exists = store.file_exists(&key, bucket).await;
            if json {
                println!("{}", serde_json::json!({ "key": key, "exists": exists }));
            } else {
                println!("{}", exists);
            }
        }
        ObjectCommand::Info { key } => {
            let meta = store.file_info(&key, bucket).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&meta)?);
            } else {
                println!("Key: {}", meta.key);
                println!("   Size: {} bytes", meta.size);
                if let Some(etag) = &meta.etag {
                    println!("   ETag: {}", etag);
                }
                if let Some(modified) = meta.last_modified {
                    println!("   Last modified: {}", modified);
                }
                if let Some(content_type) = &meta.content_type {
                    println!("   Content type: {}", content_type);
                }
            }
        }
        ObjectCommand::Delete { key } => {
            store.delete_file(&key, bucket).await?;
            if json {
                println!("{}", serde_json::json!({ "key": key, "deleted": true }));
            } else {
                println!("Deleted {}/{}", bucket, key);
            }
        }
    }
    Ok(())
}
