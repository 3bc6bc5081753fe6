use firmhub_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (database, services, consumers, routes)
    let app = firmhub_api::setup::initialize_app(config.clone()).await?;

    // Start the server; consumers stop once it has drained
    firmhub_api::setup::server::start_server(&config, app.router).await?;
    app.queue.shutdown().await;

    Ok(())
}
