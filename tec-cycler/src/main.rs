mod commands;
mod handlers;
mod output;

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = commands::Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
    handlers::handle_command(cli)
}
