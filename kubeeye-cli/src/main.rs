///! KubeEye CLI
///!
///! Command-line front end for the cluster health analysis engine

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use kubeeye_engine::types::PodLogQuery;
use kubeeye_engine::{HealthEngine, K8sClient, KubeEyeConfig};
use output::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a kubeconfig file
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Configuration file (defaults to KUBEEYE_CONFIG or ./kubeeye.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Abort after this many seconds (overrides analysis.timeout_secs)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report unhealthy objects of one kind, or of every kind
    Analyze {
        /// Pod, Deployment, StatefulSet, Service, Ingress, NetworkPolicy,
        /// CronJob, Node, ValidatingWebhookConfiguration or
        /// MutatingWebhookConfiguration; omit to run all analyzers
        kind: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Show CPU and memory usage per workload
    Usage {
        /// Deployment, StatefulSet, DaemonSet, ReplicaSet or Pod
        kind: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Print the log tail of a pod
    Logs {
        /// Pod name
        pod: String,
        #[arg(short, long)]
        namespace: Option<String>,
        /// Container; required when the pod runs several
        #[arg(short, long)]
        container: Option<String>,
        /// Lines from the end of the log
        #[arg(long, default_value_t = kubeeye_engine::types::DEFAULT_LOG_TAIL_LINES, conflicts_with = "all")]
        tail: i64,
        /// Print the whole log
        #[arg(long)]
        all: bool,
        /// Logs of the previous container instance
        #[arg(short, long)]
        previous: bool,
    },
    /// Generic resource operations for any served kind
    Resource {
        #[command(subcommand)]
        command: ResourceCommands,
    },
    /// List every kind the cluster serves
    Kinds,
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Which objects a command looks at
#[derive(clap::Args, Debug, Clone, Default)]
struct ScopeArgs {
    /// Namespace; all namespaces when omitted
    #[arg(short, long)]
    namespace: Option<String>,
    /// Only the object with this name
    #[arg(long)]
    name: Option<String>,
    /// Label selector, e.g. app=web
    #[arg(short = 'l', long)]
    selector: Option<String>,
}

#[derive(Subcommand)]
enum ResourceCommands {
    /// List objects of a kind
    List {
        kind: String,
        #[arg(short, long)]
        namespace: Option<String>,
        /// Label selector
        #[arg(short = 'l', long)]
        selector: Option<String>,
        /// Field selector
        #[arg(long)]
        field_selector: Option<String>,
    },
    /// Show one object
    Get {
        kind: String,
        name: String,
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Delete one object
    Delete {
        kind: String,
        name: String,
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// Server-side apply a multi-document YAML manifest
    Apply {
        /// Manifest file, or - for stdin
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a sample configuration file
    Sample,
    /// Print the effective configuration
    Show,
}

fn load_config(cli: &Cli) -> Result<KubeEyeConfig> {
    let mut config = match &cli.config {
        Some(path) => KubeEyeConfig::load_from_file(path)?,
        None => KubeEyeConfig::load(),
    };

    if let Some(path) = &cli.kubeconfig {
        config.cluster.kubeconfig = Some(path.clone());
    }
    if let Some(context) = &cli.context {
        config.cluster.context = Some(context.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.analysis.timeout_secs = timeout;
    }

    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli, config: KubeEyeConfig) -> Result<()> {
    let client = K8sClient::from_settings(&config.cluster)
        .await
        .context("failed to connect to the cluster")?;
    tracing::debug!(api_server = %client.api_server(), "connected");

    let engine = HealthEngine::new(client, config.analysis.clone());

    match cli.command {
        Commands::Analyze { kind, scope } => {
            commands::analyze::handle_analyze_command(&engine, kind.as_deref(), &scope.into(), cli.output)
                .await?
        }
        Commands::Usage { kind, scope } => {
            commands::usage::handle_usage_command(&engine, &kind, &scope, cli.output).await?
        }
        Commands::Logs {
            pod,
            namespace,
            container,
            tail,
            all,
            previous,
        } => {
            let query = PodLogQuery {
                container,
                tail_lines: (!all).then_some(tail),
                previous,
            };
            commands::logs::handle_logs_command(&engine, namespace.as_deref(), &pod, &query, cli.output)
                .await?
        }
        Commands::Resource { command } => {
            commands::resource::handle_resource_command(command, &engine, cli.output).await?
        }
        Commands::Kinds => commands::kinds::handle_kinds_command(&engine, cli.output).await?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

impl From<ScopeArgs> for kubeeye_engine::AnalysisScope {
    fn from(args: ScopeArgs) -> Self {
        Self {
            namespace: args.namespace,
            name: args.name,
            label_selector: args.selector,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Commands that never touch the cluster
    match &cli.command {
        Commands::Config { command: ConfigCommands::Sample } => {
            print!("{}", KubeEyeConfig::generate_sample());
            return;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "kubeeye", &mut std::io::stdout());
            return;
        }
        _ => {}
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            std::process::exit(2);
        }
    };

    let _guard = match config.logging.init() {
        Ok(guard) => guard,
        Err(e) => {
            output::print_error(&format!("failed to initialize logging: {}", e));
            None
        }
    };

    if let Commands::Config { command: ConfigCommands::Show } = &cli.command {
        if let Err(e) = output::print_single(&config, cli.output) {
            output::print_error(&format!("{:#}", e));
            std::process::exit(1);
        }
        return;
    }

    let timeout = Duration::from_secs(config.analysis.timeout_secs);
    let result = tokio::select! {
        result = tokio::time::timeout(timeout, run(cli, config)) => match result {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("timed out after {}s", timeout.as_secs())),
        },
        _ = tokio::signal::ctrl_c() => Err(anyhow::anyhow!("interrupted")),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
