mod cli;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // la barra de progreso usa stderr; los logs por default sólo muestran avisos
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("xlsmd=info,client=warn,reqwest=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    cli::run().await
}
