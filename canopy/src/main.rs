use canopy::commands::command_argument_builder;
use canopy::{AnalyzeConfig, TriggerConfig, handle_analyze, handle_trigger, print_banner};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // RUST_LOG controls verbosity; keep stdout for reports
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("analyze", primary_command)) => {
            match AnalyzeConfig::from_matches(primary_command, quiet) {
                Ok(config) => handle_analyze(config).await,
                Err(e) => Err(e),
            }
        }
        Some(("trigger", primary_command)) => match TriggerConfig::from_matches(primary_command) {
            Ok(config) => handle_trigger(config).await.map(|_| ()),
            Err(e) => Err(e),
        },
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
