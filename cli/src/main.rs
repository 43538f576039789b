use std::io::Write as _;

use clap::Parser;
use colored::Colorize;
use kyohack_cli::cmd::GlobalArgs;
use kyohack_core::{rebuild, style::ColorTheme};

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                format!("[{}]", level).color(level.color()),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let app = GlobalArgs::parse();
    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("Error: {:?}", e);
        let code = e
            .downcast_ref::<rebuild::Error>()
            .map_or(1, rebuild::Error::exit_code);
        std::process::exit(code);
    });
}
