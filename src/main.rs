mod cli;

use imagebed::{
    config,
    server::{self, auth},
};
use imagebed_store::ImageStore;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "imagebed=trace,imagebed_store=trace,tower_http=debug".to_string()
        } else {
            "imagebed=debug,imagebed_store=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::List { json } => list_images(cli.config.as_deref(), json),
        Commands::Validate { path } => {
            let path = path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("imagebed {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::HashPassword { password } => hash_password(&password),
        Commands::GenerateSecret => {
            println!("{}", auth::generate_secret());
            Ok(())
        }
    }
}

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting imagebed");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn list_images(config_path: Option<&std::path::Path>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let store = ImageStore::open(
        &config.storage.upload_dir,
        config.storage.extensions(),
        config.storage.max_file_size,
    )
    .with_context(|| format!("Failed to open upload directory {:?}", config.storage.upload_dir))?;

    let images = store.list()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&images)?);
        return Ok(());
    }

    if images.is_empty() {
        println!("No images in {}", store.root().display());
        return Ok(());
    }

    for image in &images {
        println!(
            "{}  {:>10}  {}",
            image.created.format("%Y-%m-%d %H:%M:%S"),
            image.size,
            image.filename
        );
    }
    println!("\n{} image(s) in {}", images.len(), store.root().display());

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Upload dir: {}", config.storage.upload_dir.display());
            println!(
                "  Extensions: {}",
                config.storage.extensions().iter().collect::<Vec<_>>().join(", ")
            );
            println!("  Max file size: {} bytes", config.storage.max_file_size);
            println!(
                "  Password configured: {}",
                config.auth.password_hash.is_some()
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  Upload dir: {}", config.storage.upload_dir.display());
        }
    }

    Ok(())
}

fn hash_password(password: &str) -> Result<()> {
    let hash = auth::hash_password(password)?;
    println!("{}", hash);
    Ok(())
}
