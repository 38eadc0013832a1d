use mercato_api::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    mercato_observability::init();

    let config = ApiConfig::from_env()?;
    let bind_addr = config.bind_addr;
    tracing::info!(?config, "starting");

    let app = mercato_api::app::build_app(config).await?;

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
