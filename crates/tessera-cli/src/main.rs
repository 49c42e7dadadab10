use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;

use tessera::SessionContext;
use tessera::logging::init_tracing;
use tessera_cli::commands;
use tessera_config::{SessionConfig, StoreConfig};
use tessera_store::RedisStore;

#[derive(Parser)]
#[command(name = "tessera-cli")]
#[command(about = "Tessera CLI - Inspect and revoke token sessions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Count live refresh sessions
    Count {
        /// Namespace to count; omit for un-namespaced sessions
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },
    /// Show the stored record of one refresh session
    Inspect {
        /// Refresh token uid
        uid: String,

        /// Namespace of the session; omit to search all namespaces
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },
    /// Revoke one refresh session by uid
    Revoke {
        /// Refresh token uid
        uid: String,

        /// Namespace of the session; omit to search all namespaces
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },
    /// Revoke every session in a namespace
    FlushNamespace {
        /// Namespace to flush; omit for un-namespaced sessions
        #[arg(short = 'n', long)]
        namespace: Option<String>,
    },
    /// Revoke every session in every namespace
    FlushAll,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let store = RedisStore::new(&StoreConfig::from_env()).await?;
    let ctx = SessionContext::new(SessionConfig::from_env(), Arc::new(store))?;

    match cli.command {
        Commands::Count { namespace } => handle_count(&ctx, namespace.as_deref()).await,
        Commands::Inspect { uid, namespace } => {
            handle_inspect(&ctx, &uid, namespace.as_deref()).await
        }
        Commands::Revoke { uid, namespace } => {
            handle_revoke(&ctx, &uid, namespace.as_deref()).await
        }
        Commands::FlushNamespace { namespace } => {
            handle_flush_namespace(&ctx, namespace.as_deref()).await
        }
        Commands::FlushAll => handle_flush_all(&ctx).await,
    }

    Ok(())
}

async fn handle_count(ctx: &SessionContext, namespace: Option<&str>) {
    match commands::count(ctx, namespace).await {
        Ok(count) => {
            println!("✅ {} live sessions in {}", count, namespace_label(namespace));
        }
        Err(e) => {
            eprintln!("\n❌ Error counting sessions: {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_inspect(ctx: &SessionContext, uid: &str, namespace: Option<&str>) {
    match commands::inspect(ctx, uid, namespace).await {
        Ok(refresh) => {
            println!("✅ Session found");
            println!("{}", commands::describe(&refresh));
        }
        Err(e) => {
            eprintln!("\n❌ Error inspecting session: {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_revoke(ctx: &SessionContext, uid: &str, namespace: Option<&str>) {
    match commands::revoke(ctx, uid, namespace).await {
        Ok(()) => println!("✅ Session {} revoked", uid),
        Err(e) => {
            eprintln!("\n❌ Error revoking session: {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_flush_namespace(ctx: &SessionContext, namespace: Option<&str>) {
    match commands::flush_namespace(ctx, namespace).await {
        Ok(count) => {
            println!("✅ Flushed {} sessions in {}", count, namespace_label(namespace));
        }
        Err(e) => {
            eprintln!("\n❌ Error flushing namespace: {}", e);
            std::process::exit(1);
        }
    }
}

async fn handle_flush_all(ctx: &SessionContext) {
    match commands::flush_all(ctx).await {
        Ok(count) => println!("✅ Flushed {} sessions", count),
        Err(e) => {
            eprintln!("\n❌ Error flushing sessions: {}", e);
            std::process::exit(1);
        }
    }
}

fn namespace_label(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("namespace '{}'", ns),
        None => "the default namespace".to_string(),
    }
}
