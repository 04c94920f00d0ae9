use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use berth_core::domain::{ContentDigest, InstanceName};
use berth_core::impls::{CliRuntime, Credentials, OciRegistryResolver, RuntimeFlavor};
use berth_core::{EngineEnv, ProvisionReport, Provisioner, ProvisionerConfig};

const USER_AGENT: &str = concat!("berth/", env!("CARGO_PKG_VERSION"));

/// berth - provision and garbage-collect engine containers
#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Provision berth engine containers on a local container runtime", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "BERTH_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Instance name prefix (overrides the config file)
    #[arg(long, env = "BERTH_INSTANCE_PREFIX", global = true)]
    prefix: Option<String>,

    /// Container runtime CLI to drive (docker, podman, nerdctl)
    #[arg(long, env = "BERTH_RUNTIME", default_value = "docker", global = true)]
    runtime: RuntimeFlavor,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision an engine and print its connection handle
    Provision {
        /// Runner host (docker-image://...) or image reference
        target: String,

        /// Print a JSON report instead of the bare handle
        #[arg(long)]
        json: bool,

        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        #[arg(long, env = "BERTH_REGISTRY_USERNAME")]
        registry_username: Option<String>,

        #[arg(long, env = "BERTH_REGISTRY_PASSWORD", hide_env_values = true)]
        registry_password: Option<String>,
    },

    /// List leftover engine containers, newest first
    Discover,

    /// Print the instance name derived from an image digest
    Name {
        /// sha256:<64 hex>
        digest: ContentDigest,
    },

    /// Remove leftover engine containers
    Gc {
        /// Instance to leave in place
        #[arg(long)]
        keep: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let mut config = ProvisionerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(prefix) = cli.prefix.clone() {
        config.instance_prefix = prefix;
    }

    match cli.command {
        Commands::Name { digest } => {
            println!("{}", InstanceName::for_digest(&config.instance_prefix, &digest));
        }
        Commands::Discover => {
            let provisioner = build(cli.runtime, config, None)?;
            let leftovers = provisioner.leftovers().await.context("listing engine containers")?;
            for name in leftovers.iter() {
                println!("{name}");
            }
        }
        Commands::Gc { keep } => {
            let provisioner = build(cli.runtime, config, None)?;
            let keep = keep.map(InstanceName::new);
            let report = provisioner
                .collect_leftovers(keep.as_ref())
                .await
                .context("listing engine containers")?;
            tracing::info!(
                removed = report.removed.len(),
                in_progress = report.in_progress.len(),
                failed = report.failed.len(),
                "garbage collection finished"
            );
            if !report.is_clean() {
                anyhow::bail!("failed to remove {} engine container(s)", report.failed.len());
            }
        }
        Commands::Provision {
            target,
            json,
            timeout,
            registry_username,
            registry_password,
        } => {
            if timeout.is_some() {
                config.deadline_secs = timeout;
            }
            let credentials = registry_username
                .zip(registry_password)
                .map(|(user, password)| Credentials::new(user, password));
            let provisioner = build(cli.runtime, config, credentials)?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let outcome = provisioner
                .provision(&target, &cancel)
                .await
                .with_context(|| format!("provisioning engine for {target}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ProvisionReport::new(&outcome))?);
            } else {
                println!("{}", outcome.handle);
            }
        }
    }

    Ok(())
}

fn build(
    flavor: RuntimeFlavor,
    config: ProvisionerConfig,
    credentials: Option<Credentials>,
) -> Result<Provisioner> {
    let mut resolver = OciRegistryResolver::new(USER_AGENT).context("building registry client")?;
    if let Some(credentials) = credentials {
        resolver = resolver.with_credentials(credentials);
    }
    Provisioner::builder()
        .resolver(Arc::new(resolver))
        .runtime(Arc::new(CliRuntime::new(flavor)))
        .config(config)
        .env(EngineEnv::from_env())
        .build()
        .context("building provisioner")
}
