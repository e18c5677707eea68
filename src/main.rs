use fieldtrack::config::Config;
use fieldtrack::engine::Engine;
use fieldtrack::error::Error;
use fieldtrack::server::serve;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    let engine = Engine::from_config(&config).await?;

    serve(engine, config.listen_addr).await
}
