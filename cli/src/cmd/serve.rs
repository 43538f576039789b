use anyhow::Context as _;
use kyohack_core::{
    action::{self, ServeOptions},
    daemon::CandidatePatterns,
};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Shared secret; HTTP requests must carry it as the whole query string
    #[arg()] // positional argument
    pub token: String,

    /// Address to listen on [default: serve.bind in kyohack.toml]
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Port to listen on [default: serve.port in kyohack.toml]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Timeout per testcase in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let root = fsutil::canonicalize_path(util::current_dir())
        .context("Failed to resolve the working directory")?;

    let opts = ServeOptions {
        root,
        bind: args.bind.clone().unwrap_or_else(|| cfg.serve.bind.clone()),
        port: args.port.unwrap_or(cfg.serve.port),
        token: args.token.clone(),
        case_timeout: util::timeout(args.timeout, &cfg)?,
        patterns: CandidatePatterns {
            compiled: cfg.serve.compiled.clone(),
            scripts: cfg.serve.scripts.clone(),
        },
    };
    action::serve(opts, util::executor(&cfg)).await
}
