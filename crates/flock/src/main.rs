mod cli;

use std::io;

use clap::Parser;
use cli::{Opts, make_web_opts};
use flock_web::{Server, WebServerError};
use snafu::{FromString as _, OptionExt as _, ResultExt as _, Snafu, Whatever};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

pub const LOG_TARGET: &str = "flock::cli";

type WhateverResult<T> = std::result::Result<T, snafu::Whatever>;

#[derive(Debug, Snafu)]
pub enum CliError {
    #[snafu(display("Server error: {source}"))]
    WebServer { source: WebServerError },
    #[snafu(display("No data dir given and none could be determined for this platform"))]
    DataDir,
    #[snafu(display("Miscellaneous error: {source}"))]
    Whatever { source: Whatever },
}

pub type CliResult<T> = std::result::Result<T, CliError>;

#[snafu::report]
#[tokio::main]
async fn main() -> CliResult<()> {
    init_logging().context(WhateverSnafu)?;

    let opts = Opts::parse();
    handle_cmd(opts).await
}

async fn handle_cmd(opts: Opts) -> CliResult<()> {
    match opts.cmd {
        cli::OptsCmd::Serve(ref serve_opts) => {
            let data_dir = opts.global.data_dir().context(DataDirSnafu)?;
            info!(target: LOG_TARGET, data_dir = %data_dir.display(), "Starting flock");

            let server = Server::init(make_web_opts(data_dir, serve_opts))
                .await
                .context(WebServerSnafu)?;
            server.run().await.context(WebServerSnafu)?;
        }
    }
    Ok(())
}

pub fn init_logging() -> WhateverResult<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .map_err(|_| Whatever::without_source("Failed to initialize logging".to_string()))?;

    Ok(())
}
