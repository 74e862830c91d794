use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use slave_bot::domain::entities::{Guild, Member, Message, Role, User};
use slave_bot::domain::traits::ResourceProvisioner;
use slave_bot::infrastructure::adapters::ConsoleAdapter;
use slave_bot::infrastructure::database::SqliteProvisioner;
use slave_bot::infrastructure::storage::MemoryProvisioner;
use slave_bot::{FileConfigSource, PluginRegistry, RuntimeConfig, RuntimeServer};

const CONSOLE_GUILD: &str = "console";
const CONSOLE_CHANNEL: &str = "console";
const CONSOLE_USER: &str = "operator";
const ADMIN_ROLE_ID: &str = "console-admin";

#[derive(Parser)]
#[command(name = "slave-bot")]
#[command(about = "A plugin host for chat bots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "slave.yaml")]
    config: String,

    /// Keep plugin data in memory instead of SQLite files
    #[arg(long)]
    memory_store: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot on the local console
    Run,
    /// Show version
    Version,
    /// Generate default config
    InitConfig,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run => run_bot(&cli.config, cli.memory_store),
        Commands::Version => {
            println!("slave-bot v{}", env!("CARGO_PKG_VERSION"));
            0
        }
        Commands::InitConfig => init_config(&cli.config),
    };
    std::process::exit(code);
}

fn run_bot(config_path: &str, memory_store: bool) -> i32 {
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let provisioner: Arc<dyn ResourceProvisioner> = if memory_store {
            tracing::info!("Using in-memory plugin storage");
            Arc::new(MemoryProvisioner::new())
        } else {
            // relocated to the configured data-dir on every setup
            Arc::new(SqliteProvisioner::new(RuntimeConfig::default().data_dir()))
        };

        let gateway = Arc::new(ConsoleAdapter::new().with_echo());
        let runtime = RuntimeServer::new(
            gateway.clone(),
            provisioner,
            PluginRegistry::with_builtins(),
            Arc::new(FileConfigSource::new(config_path)),
        );

        if let Err(e) = runtime.setup().await {
            tracing::error!("Setup failed: {}", e);
            return 1;
        }
        if let Err(e) = runtime.start().await {
            tracing::error!("Start failed: {}", e);
            return 1;
        }

        println!("slave-bot is running. Type messages, Ctrl+D or Ctrl+C to exit.");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => {
                        gateway.inject(console_message(&runtime.admin_role(), line));
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!("Failed to read stdin: {}", e);
                        break;
                    }
                },
            }
        }

        runtime.quit().await;
        0
    })
}

/// A console line as a message from the operator, who holds the admin role
fn console_message(admin_role: &str, content: String) -> Message {
    let guild = Guild::new(CONSOLE_GUILD, "console").with_role(Role::new(ADMIN_ROLE_ID, admin_role));
    let member = Member::new(CONSOLE_USER).with_role(ADMIN_ROLE_ID);

    Message::new(CONSOLE_CHANNEL, User::new(CONSOLE_USER).with_username("operator"), content)
        .in_guild(guild)
        .with_member(member)
}

fn init_config(path: &str) -> i32 {
    if Path::new(path).exists() {
        eprintln!("{} already exists, not overwriting", path);
        return 1;
    }

    let yaml = match RuntimeConfig::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Failed to render config: {}", e);
            return 1;
        }
    };
    if let Err(e) = std::fs::write(path, yaml) {
        eprintln!("Failed to write {}: {}", path, e);
        return 1;
    }
    println!("Wrote {}. Set bot-token and adjust the plugin list as needed.", path);
    0
}
