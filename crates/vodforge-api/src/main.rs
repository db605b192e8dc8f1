mod api_doc;
mod error;
mod handlers;
mod setup;
mod state;
mod video_state_impl;

use vodforge_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    setup::init_tracing();

    let config = Config::from_env().map_err(anyhow::Error::msg)?;

    let (_state, router) = setup::initialize_app(config.clone()).await?;
    setup::start_server(&config, router).await?;

    Ok(())
}
