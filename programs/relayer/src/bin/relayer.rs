use clap::Parser;
use hub_relayer::{
    cli::{Commands, RelayerCli},
    observability::init_observability,
    server::serve_metrics,
    shutdown::cancel_on_shutdown_signal,
};
use hub_relayer_core::{
    config::RelayerConfig,
    orchestrator::{Collaborators, Orchestrator},
    RelayerIdentity,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = RelayerCli::parse();
    match &cli.command {
        Commands::Start(args) => {
            let home = cli.home()?;
            let config = RelayerConfig::from_home(&home)?;

            let identity = RelayerIdentity::new(
                &home,
                config.child.chain_id.clone(),
                config.hub.chain_id.clone(),
            );

            let _guard = init_observability(&config.observability, &identity.log_dir())?;

            info!(
                "Observability initialized with level: {}",
                config.observability.level()
            );

            // Start the metrics server.
            if let Some(metrics) = config.metrics.clone() {
                tokio::spawn(async move {
                    if let Err(e) = serve_metrics(metrics).await {
                        error!(error = %e, "Metrics server failed");
                    }
                });
            }

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_shutdown_signal(cancel.clone()));

            // Run the relayer until it is cancelled.
            let collaborators = Collaborators::rly(&identity, &config);
            let mut orchestrator = Orchestrator::new(identity, config, collaborators);
            orchestrator.run(args.override_channel, &cancel).await?;

            info!("Relayer stopped");
            Ok(())
        }
    }
}
