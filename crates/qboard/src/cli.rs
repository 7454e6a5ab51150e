//! Command-line surface.

use std::net::IpAddr;

use clap::{Args, Parser, Subcommand};

use crate::config::StartConfig;
use crate::error::ConfigError;

/// BullMQ inspector
#[derive(Parser, Debug)]
#[command(name = "qboard", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Starts the server
    Start(StartArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// The port to listen on
    #[arg(short, long, value_name = "PORT", env = "PORT")]
    pub port: Option<u16>,

    /// The redis url to connect to
    #[arg(short, long, value_name = "REDIS_URL", env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// The queue name to listen to (repeatable)
    #[arg(short, long = "queue-name", value_name = "QUEUE_NAME")]
    pub queue_name: Vec<String>,

    /// The address to listen on (defaults to 127.0.0.1)
    #[arg(long, value_name = "HOST")]
    pub host: Option<IpAddr>,

    /// The path to mount the dashboard under
    #[arg(long, value_name = "PATH")]
    pub base_path: Option<String>,

    /// The number of jobs shown per page
    #[arg(long, value_name = "COUNT")]
    pub jobs_per_page: Option<usize>,

    /// Hide retry, promote, remove, clean and pause actions
    #[arg(long)]
    pub read_only: bool,
}

impl StartArgs {
    /// Validate into a [`StartConfig`].
    pub fn into_config(self) -> Result<StartConfig, ConfigError> {
        Ok(StartConfig::new(self.port, self.redis_url, self.queue_name)?
            .with_host(self.host)
            .with_base_path(self.base_path)
            .with_jobs_per_page(self.jobs_per_page)
            .with_read_only(self.read_only))
    }
}
