pub mod hack;
pub mod interact;
pub mod serve;
pub mod test;

use std::path::PathBuf;

use kyohack_core::config::Config;

use crate::util;

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Use this config file instead of searching for kyohack.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not run the build command before running programs
    #[arg(long, global = true)]
    pub no_build: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    /// Stress-test a program with random inputs
    #[command(alias("h"))]
    Hack(hack::Args),

    /// Run two programs talking to each other
    #[command(alias("i"))]
    Interact(interact::Args),

    /// Evaluate programs on demand, fed by stdin and HTTP
    Serve(serve::Args),

    /// Judge a program against the testcases beside it
    #[command(alias("t"))]
    Test(test::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Hack(args) => hack::exec(args, self).await,
            Interact(args) => interact::exec(args, self).await,
            Serve(args) => serve::exec(args, self).await,
            Test(args) => test::exec(args, self).await,
        }
    }

    pub fn load_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::from_toml_file(path.clone())?,
            None => Config::from_file_finding_in_ancestors(util::current_dir())?,
        };
        if self.no_build {
            cfg.build.enabled = false;
        }
        log::debug!("Config loaded from {:?}", cfg.source_config_file);
        Ok(cfg)
    }
}
