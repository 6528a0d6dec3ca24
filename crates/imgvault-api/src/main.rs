use imgvault_api::setup;
use imgvault_core::Config;

// mimalloc as the global allocator: lower fragmentation under many small
// concurrent allocations, notably on musl-based container images.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, app.router).await?;

    for task in app.background {
        task.abort();
    }

    Ok(())
}
