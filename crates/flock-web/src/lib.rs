//! HTTP API and live timeline streams
mod error;
mod routes;

use std::future::Future;
use std::io;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr as _;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use flock_db::{Database, DbError};
use flock_timeline::{FanOutConfig, Timeline};
use flock_util_error::WhateverResult;
use snafu::{ResultExt as _, Snafu, Whatever};
use tokio::net::{TcpListener, TcpSocket};
use tokio::signal;
use tower_http::CompressionLevel;
use tower_http::compression::CompressionLayer;
use tower_http::compression::predicate::{And, NotForContentType, Predicate as _, SizeAbove};
use tower_http::cors::CorsLayer;
use tracing::info;

pub use self::error::{RequestError, RequestResult};

pub const LOG_TARGET: &str = "flock::web";

#[derive(Clone, Debug)]
pub struct Opts {
    pub listen: String,
    pub cors_origin: Option<String>,
    pub data_dir: PathBuf,
    pub fanout: FanOutConfig,
    /// Interval of keep-alive comments on timeline streams
    pub keep_alive: Duration,
}

impl Opts {
    pub fn new(listen: String, data_dir: PathBuf) -> Self {
        Self {
            listen,
            cors_origin: None,
            data_dir,
            fanout: FanOutConfig::default(),
            keep_alive: Duration::from_secs(15),
        }
    }

    pub fn cors_origin(&self, listen: SocketAddr) -> WhateverResult<HeaderValue> {
        self.cors_origin
            .clone()
            .unwrap_or_else(|| format!("http://{listen}"))
            .parse()
            .whatever_context("cors_origin does not parse as an http value")
    }
}

pub struct AppState {
    pub db: Arc<Database>,
    pub timeline: Arc<Timeline>,
    pub opts: Opts,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Snafu)]
pub enum WebServerError {
    #[snafu(transparent)]
    IO { source: io::Error },

    Database { source: DbError },

    ListenAddr { source: AddrParseError },

    Cors { source: Whatever },
}

pub type ServerResult<T> = std::result::Result<T, WebServerError>;

pub struct Server {
    listener: TcpListener,
    state: SharedState,
}

impl Server {
    /// Open the database, start the timeline and bind the listener
    pub async fn init(opts: Opts) -> ServerResult<Server> {
        let db = Arc::new(
            Database::open(Database::mk_db_path(&opts.data_dir).await?)
                .await
                .context(DatabaseSnafu)?,
        );
        let timeline = Timeline::builder()
            .store(db.clone())
            .resolver(db.clone())
            .fanout(opts.fanout)
            .build();

        let listener = Self::get_listener(&opts).await?;
        info!(target: LOG_TARGET, addr = %listener.local_addr()?, "Listening");

        Ok(Self {
            listener,
            state: Arc::new(AppState { db, timeline, opts }),
        })
    }

    pub async fn get_listener(opts: &Opts) -> ServerResult<TcpListener> {
        let socket = {
            let addr = SocketAddr::from_str(&opts.listen).context(ListenAddrSnafu)?;

            let socket = if addr.is_ipv4() {
                TcpSocket::new_v4()?
            } else {
                TcpSocket::new_v6()?
            };
            socket.set_nodelay(true)?;
            socket.bind(addr)?;

            socket
        };

        Ok(socket.listen(1024)?)
    }

    pub fn addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `signal` completes
    ///
    /// On shutdown open timeline streams are ended first, so the server is
    /// not kept waiting for them, and queued fan-out jobs are drained.
    pub async fn run_until(
        self,
        signal: impl Future<Output = ()> + Send + 'static,
    ) -> ServerResult<()> {
        let listen = self.addr()?;
        let router = routes::route_handler(self.state.clone())
            .layer(cors_layer(&self.state.opts, listen)?)
            .layer(compression_layer());
        let timeline = self.state.timeline.clone();

        info!(target: LOG_TARGET, %listen, "Starting server");
        axum::serve(self.listener, router)
            .with_graceful_shutdown(async move {
                signal.await;
                info!(target: LOG_TARGET, "Shutdown requested");
                timeline.shutdown().await;
            })
            .await?;
        info!(target: LOG_TARGET, "Server stopped");

        Ok(())
    }
}

/// Compress larger responses, never event streams
fn compression_layer() -> CompressionLayer<And<SizeAbove, NotForContentType>> {
    CompressionLayer::new()
        .quality(CompressionLevel::Precise(4))
        .compress_when(SizeAbove::new(512).and(NotForContentType::SSE))
}

fn cors_layer(opts: &Opts, listen: SocketAddr) -> ServerResult<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400))
        .allow_origin(opts.cors_origin(listen).context(CorsSnafu)?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::OPTIONS,
            Method::HEAD,
            Method::PATCH,
        ]))
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
