use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use flock_timeline::FanOutConfig;

/// Social network backend with live timelines
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Opts {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub cmd: OptsCmd,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Directory holding the database
    #[arg(env = "FLOCK_DATA_DIR", long, global = true)]
    pub data_dir: Option<PathBuf>,
}

static PROJECTS_DIR: LazyLock<Option<directories::ProjectDirs>> =
    LazyLock::new(|| directories::ProjectDirs::from("org", "Flock", "flock"));

impl GlobalOpts {
    /// `None` if not given and the platform has no data directory
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref().or_else(|| {
            PROJECTS_DIR
                .as_ref()
                .map(|dirs| dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir()))
        })
    }
}

#[derive(Debug, Subcommand)]
pub enum OptsCmd {
    /// Run the HTTP API server
    Serve(ServeOpts),
}

#[derive(Debug, Args)]
pub struct ServeOpts {
    /// Listen address
    #[arg(long, short, default_value = "[::1]:3740", env = "FLOCK_LISTEN")]
    pub listen: String,

    /// Cors origin settings
    #[arg(long, env = "FLOCK_CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Number of fan-out worker tasks
    #[arg(long, default_value = "4", env = "FLOCK_FANOUT_WORKERS")]
    pub fanout_workers: NonZeroUsize,

    /// Capacity of each fan-out worker's job queue
    #[arg(long, default_value = "1024", env = "FLOCK_FANOUT_QUEUE")]
    pub fanout_queue: NonZeroUsize,

    /// Interval of keep-alive comments on timeline streams
    #[arg(long, default_value = "15", env = "FLOCK_KEEP_ALIVE_SECS")]
    pub keep_alive_secs: u64,
}

pub fn make_web_opts(data_dir: &Path, opts: &ServeOpts) -> flock_web::Opts {
    flock_web::Opts {
        cors_origin: opts.cors_origin.clone(),
        fanout: FanOutConfig {
            workers: opts.fanout_workers.get(),
            queue_capacity: opts.fanout_queue.get(),
        },
        keep_alive: Duration::from_secs(opts.keep_alive_secs),
        ..flock_web::Opts::new(opts.listen.clone(), data_dir.to_owned())
    }
}
