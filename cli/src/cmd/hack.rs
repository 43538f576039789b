use std::{path::PathBuf, process::exit};

use kyohack_core::{
    action,
    judge::Tolerance,
    stress::{FailureSlot, RandomHack, StressOutcome},
};

use crate::util;

use super::{GlobalArgs, SubcmdResult};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// Program under test
    #[arg()] // positional argument
    pub candidate: PathBuf,

    /// Trusted program; when given, the candidate's output is judged against it
    #[arg()]
    pub reference: Option<PathBuf>,

    /// Number of rounds [default: hack.rounds in kyohack.toml]
    #[arg(short = 'n', long)]
    pub rounds: Option<u32>,

    /// Timeout per program run in seconds
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Random input generator [default: hack.generator in kyohack.toml]
    #[arg(short, long)]
    pub generator: Option<PathBuf>,

    /// Allowed absolute/relative error, e.g. 1e-6 [default: contents of `tol` beside the generator]
    #[arg(short, long)]
    pub tolerance: Option<Tolerance>,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let cfg = global_args.load_config()?;
    let timeout = util::timeout(args.timeout, &cfg)?;
    let generator = args.generator.clone().unwrap_or_else(|| cfg.hack.generator.clone());

    let mut targets = vec![&generator, &args.candidate];
    targets.extend(&args.reference);
    util::rebuild(&targets, &cfg).await?;

    let tolerance = args
        .tolerance
        .or_else(|| action::tolerance_beside(action::dir_of(&generator)));

    let hack = RandomHack {
        generator,
        candidate: args.candidate.clone(),
        reference: args.reference.clone(),
        rounds: args.rounds.unwrap_or(cfg.hack.rounds),
        timeout,
        tolerance,
    };
    let slot = FailureSlot::new(&cfg.hack.failed_file);

    match action::do_hack(&hack, &slot, &util::executor(&cfg)).await? {
        StressOutcome::Survived { .. } => Ok(()),
        StressOutcome::Failed { .. } => exit(1),
    }
}
