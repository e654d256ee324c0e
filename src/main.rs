use clap::Parser;
use dpp_gateway::{
    api::Server,
    chain::ContractClient,
    config::{Args, Config},
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Contract deployment writes its address and keys to .env
    dotenvy::dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::new(&args.log_level))
        .with(fmt::layer())
        .init();

    let mut config = Config::load(&args.config)?;
    config.apply_args(&args);
    info!("Gateway starting with config: {:?}", config);

    let key = args.secret_key()?;
    let client = ContractClient::connect(&config.chain, &key).await?;
    info!("Transactions will be sent from {:?}", client.sender());

    let server = Server::new(config.api, Arc::new(client));
    server.start().await?;

    Ok(())
}
