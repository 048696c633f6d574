use std::process::ExitCode;

use argh::FromArgs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use uqcloud_api::config::Config;
use uqcloud_api::context::Context;
use uqcloud_api::{dispatch, http, reaper};

/// Procesador de solicitudes de la plataforma Desktop Cloud.
#[derive(FromArgs)]
struct Args {
    /// ruta de la llave privada SSH usada para conectarse a los hosts
    #[argh(option)]
    key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args: Args = argh::from_env();
    let Some(key_path) = args.key else {
        println!("Debe ingresar la ruta de la llave privada SSH");
        return Ok(ExitCode::FAILURE);
    };

    let config = Config::from_env(key_path)?;
    let addr = config.bind_addr;

    let (context, workers) = Context::new(config).await?;
    dispatch::spawn(context.clone(), workers);
    reaper::spawn(context.clone());

    tracing::info!("Servidor escuchando en el puerto {}...", addr.port());
    axum::Server::bind(&addr)
        .serve(http::server(context).into_make_service())
        .await?;

    Ok(ExitCode::SUCCESS)
}
