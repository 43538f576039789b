use std::path::PathBuf;

use kyohack_core::action;

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Program to judge against the in*/out* files beside it
    #[arg()] // positional argument
    pub program_file: PathBuf,

    /// Timeout per testcase in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let timeout = util::timeout(args.timeout, &cfg)?;

    util::rebuild(&[&args.program_file], &cfg).await?;

    let _ = action::do_test(&args.program_file, &util::executor(&cfg), timeout).await?;
    Ok(())
}
