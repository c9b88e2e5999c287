use crate::cli::ServeArgs;
use crate::config::build_config;
use crate::error::Result;
use crate::server::{Server, ServerState};
use tracing::info;

pub async fn run(args: ServeArgs) -> Result<()> {
    let config = build_config(&args.config, args.bind.as_deref())?;
    let catalog = config.load_catalog()?;
    info!(ships = catalog.ships().count(), "Catalog loaded.");

    let bind = config.server.bind.clone();
    let server = Server::bind(&bind, ServerState::new(catalog, config)).await?;
    println!("Listening on {} (Ctrl-C to stop)", server.local_addr()?);

    tokio::select! {
        result = server.run() => result,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown requested.");
            Ok(())
        }
    }
}
