use std::{path::PathBuf, process::exit};

use kyohack_core::{
    action,
    interactive::InteractiveSession,
    stress::{InteractiveHack, StressOutcome},
};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Started first; usually the judge
    #[arg()] // positional argument
    pub first: PathBuf,

    /// Started second; usually the solution
    #[arg()]
    pub second: PathBuf,

    /// Number of sessions [default: interact.rounds in kyohack.toml]
    #[arg(short = 'n', long)]
    pub rounds: Option<u32>,

    /// Time limit for a whole session in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let timeout = util::timeout(args.timeout, &cfg)?;

    util::rebuild(&[&args.first, &args.second], &cfg).await?;

    let hack = InteractiveHack {
        session: InteractiveSession::new(&args.first, &args.second, timeout),
        rounds: args.rounds.unwrap_or(cfg.interact.rounds),
    };
    match action::do_interact(&hack, &util::executor(&cfg)).await? {
        StressOutcome::Survived { .. } => Ok(()),
        StressOutcome::Failed { .. } => exit(1),
    }
}
