//! Model control plane CLI
//!
//! Talks to the control-plane REST API to manage model groups, inspect
//! their pods and send inference requests.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{
    groups::{self, ScaleAction},
    pods, predict,
};

/// Model control plane CLI
#[derive(Parser)]
#[command(name = "mplane")]
#[command(author, version, about = "CLI for the model control plane", long_about = None)]
pub struct Cli {
    /// Control-plane base URL (falls back to the config file, then localhost)
    #[arg(long, env = "MPLANE_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage model groups
    #[command(subcommand)]
    Groups(GroupCommands),

    /// Inspect and remove pods
    #[command(subcommand)]
    Pods(PodCommands),

    /// Send features to a model and print its prediction
    Predict {
        /// Service address of the model (host or host:port)
        address: String,

        /// Feature values
        #[arg(required = true, allow_negative_numbers = true)]
        features: Vec<f64>,
    },

    /// Show or change the saved CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// List model groups, newest first
    List,

    /// Create a group for a model already on the shared volume
    Create {
        /// Model name or file name (e.g. Fraud_Model.h5)
        model_name: String,

        /// Serving image
        #[arg(long)]
        image: Option<String>,

        /// Port the serving container listens on
        #[arg(long)]
        container_port: Option<i32>,

        /// Port the service forwards to
        #[arg(long)]
        target_port: Option<i32>,
    },

    /// Delete a group and everything it owns
    Delete {
        /// Group or deployment name
        deployment: String,
    },

    /// Set an absolute replica count
    Scale {
        /// Group or deployment name
        deployment: String,

        /// Desired replicas
        replicas: i32,
    },

    /// Add one replica
    Up { deployment: String },

    /// Remove one replica
    Down { deployment: String },

    /// Scale to zero
    Stop { deployment: String },

    /// Scale back to one
    Start { deployment: String },
}

#[derive(Subcommand)]
pub enum PodCommands {
    /// List pods with their services
    List {
        /// Only pods of this group
        #[arg(long, short)]
        deployment: Option<String>,
    },

    /// Print recent log lines of a pod
    Logs { pod: String },

    /// Delete a single pod
    Delete { pod: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective API URL
    Show,

    /// Save the API URL to the config file
    SetUrl { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format;

    let mut settings = config::Config::load()?;
    let api_url = settings.resolve_api_url(cli.api_url);

    if let Commands::Config(cmd) = cli.command {
        match cmd {
            ConfigCommands::Show => println!("{}", api_url),
            ConfigCommands::SetUrl { url } => {
                settings.api_url = Some(url);
                settings.save()?;
                output::print_success(&format!(
                    "Saved to {}",
                    config::Config::config_path()?.display()
                ));
            }
        }
        return Ok(());
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Groups(cmd) => match cmd {
            GroupCommands::List => groups::list(&client, format).await?,
            GroupCommands::Create {
                model_name,
                image,
                container_port,
                target_port,
            } => {
                let request = client::CreateGroupRequest {
                    model_name,
                    image,
                    container_port,
                    target_port,
                };
                groups::create(&client, request, format).await?
            }
            GroupCommands::Delete { deployment } => {
                groups::delete(&client, deployment, format).await?
            }
            GroupCommands::Scale {
                deployment,
                replicas,
            } => groups::scale(&client, deployment, ScaleAction::To(replicas), format).await?,
            GroupCommands::Up { deployment } => {
                groups::scale(&client, deployment, ScaleAction::Up, format).await?
            }
            GroupCommands::Down { deployment } => {
                groups::scale(&client, deployment, ScaleAction::Down, format).await?
            }
            GroupCommands::Stop { deployment } => {
                groups::scale(&client, deployment, ScaleAction::Stop, format).await?
            }
            GroupCommands::Start { deployment } => {
                groups::scale(&client, deployment, ScaleAction::Start, format).await?
            }
        },
        Commands::Pods(cmd) => match cmd {
            PodCommands::List { deployment } => pods::list(&client, deployment, format).await?,
            PodCommands::Logs { pod } => pods::logs(&client, &pod).await?,
            PodCommands::Delete { pod } => pods::delete(&client, pod, format).await?,
        },
        Commands::Predict { address, features } => {
            predict::predict(&client, address, features, format).await?
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
