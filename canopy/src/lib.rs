use colored::Colorize;

pub mod commands;
pub mod config;
pub mod handlers;

pub use config::{AnalyzeConfig, TriggerConfig, expand_path};
pub use handlers::{
    analyze_batch, graph_document, handle_analyze, handle_trigger, load_export_from_file,
    run_trigger,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn print_banner() {
    let banner = r#"
   ___ __ _ _ __   ___  _ __  _   _
  / __/ _` | '_ \ / _ \| '_ \| | | |
 | (_| (_| | | | | (_) | |_) | |_| |
  \___\__,_|_| |_|\___/| .__/ \__, |
                       |_|    |___/ "#;
    eprintln!("{}", banner.bright_green().bold());
    eprintln!(
        "  {} {}\n",
        "workspace hierarchy analytics".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
