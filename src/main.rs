//! ocm-backplane - backplane cluster access
//!
//! Login, logout, per-cluster sessions and isolated access cloud credentials.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use backplane_broker::{
    Result,
    backplane::HttpBackplaneClientFactory,
    cli::{Cli, CloudCommand, Command},
    cloud,
    config::{BackplaneConfiguration, FileConfigProvider, OcmSettings},
    kubeconfig::default_kubeconfig_path,
    login::{Collaborators, Login},
    logout::logout,
    ocm::HttpOcmClient,
    session::{BackplaneSession, ProcessShellLauncher, SessionOptions},
    setup_tracing,
    sts::SdkStsClientFactory,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Login { cluster, kubeconfig } => {
            let path = kubeconfig_or_default(kubeconfig)?;
            let outcome = Login::new(collaborators(cli.config.as_ref())?).run(&cluster, &path).await?;
            println!(
                "Logged in to {} ({}) using {} access, context {}",
                outcome.cluster_name, outcome.cluster_id, outcome.access_mode, outcome.context
            );
            Ok(())
        }
        Command::Logout { kubeconfig } => {
            let path = kubeconfig_or_default(kubeconfig)?;
            let context = logout(&path)?;
            println!("Logged out from {context}");
            Ok(())
        }
        Command::Session { alias, cluster_id, delete } => {
            let root = BackplaneConfiguration::load(cli.config.as_deref())?.session_root()?;
            let mut session = BackplaneSession::new(
                root,
                collaborators(cli.config.as_ref())?,
                Arc::new(ProcessShellLauncher::from_env()),
            );
            session
                .run_command(&SessionOptions {
                    alias,
                    cluster_id,
                    delete_session: delete,
                })
                .await
        }
        Command::Cloud(CloudCommand::Credentials { cluster, output }) => {
            let rendered = cloud::credentials(collaborators(cli.config.as_ref())?, &cluster, output).await?;
            print!("{rendered}");
            Ok(())
        }
    }
}

fn kubeconfig_or_default(path: Option<PathBuf>) -> Result<PathBuf> {
    path.map_or_else(default_kubeconfig_path, Ok)
}

fn collaborators(config_path: Option<&PathBuf>) -> Result<Collaborators> {
    let config = BackplaneConfiguration::load(config_path.map(PathBuf::as_path))?;
    Ok(Collaborators {
        ocm: Arc::new(HttpOcmClient::new(OcmSettings::load()?)?),
        backplane: Arc::new(HttpBackplaneClientFactory::new(config.proxy_url.clone())),
        config: Arc::new(FileConfigProvider::new(config_path.cloned())),
        sts: Arc::new(SdkStsClientFactory),
    })
}
