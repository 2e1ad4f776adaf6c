//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cloud::OutputFormat;

/// Backplane cluster access: login, sessions and cloud credentials
#[derive(Parser, Debug)]
#[command(name = "ocm-backplane")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to backplane configuration file (JSON)
    #[arg(long, env = "BACKPLANE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "warn",
        env = "BACKPLANE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "BACKPLANE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in to a cluster through backplane
    Login {
        /// Cluster ID, external ID or name
        cluster: String,

        /// Kubeconfig to write (default: $KUBECONFIG or ~/.kube/config)
        #[arg(long)]
        kubeconfig: Option<PathBuf>,
    },

    /// Remove the current backplane context from the kubeconfig
    Logout {
        /// Kubeconfig to edit (default: $KUBECONFIG or ~/.kube/config)
        #[arg(long)]
        kubeconfig: Option<PathBuf>,
    },

    /// Open a shell in a per-cluster session directory
    Session {
        /// Session name; also the cluster when --cluster-id is absent
        alias: Option<String>,

        /// Cluster to bind the session to
        #[arg(short = 'c', long)]
        cluster_id: Option<String>,

        /// Delete the session directory instead
        #[arg(long)]
        delete: bool,
    },

    /// Cloud provider commands
    #[command(subcommand)]
    Cloud(CloudCommand),
}

/// Cloud subcommands
#[derive(Subcommand, Debug)]
pub enum CloudCommand {
    /// Print jump role credentials for an isolated access cluster
    Credentials {
        /// Cluster ID, external ID or name
        cluster: String,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Env)]
        output: OutputFormat,
    },
}
