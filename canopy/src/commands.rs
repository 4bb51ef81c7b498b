use crate::CLAP_STYLING;
use clap::{arg, command};
use url::Url;

pub const PROJECT_ID_ENV: &str = "CANOPY_HEX_PROJECT_ID";
pub const API_TOKEN_ENV: &str = "CANOPY_HEX_API_TOKEN";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("canopy")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("canopy")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("analyze")
                .about(
                    "Analyze a workspace export. The export is streamed in chunks exactly as a \
                live report run would deliver it.",
                )
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(true)
                        .help("Path to a JSON export with dataframe_2 records and dataframe_3 stats"),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json, markdown")
                        .value_parser(["text", "json", "markdown", "md"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)"),
                )
                .arg(
                    arg!(--"graph-out" <PATH>)
                        .required(false)
                        .help("Write the node/link graph and creation timeline as JSON"),
                )
                .arg(
                    arg!(--"chunk-size" <RECORDS>)
                        .required(false)
                        .help("Records per streamed chunk")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("500"),
                ),
        )
        .subcommand(
            command!("trigger")
                .about("Start a report run for a workspace and print its run id")
                .arg(
                    arg!(-w --"workspace" <ID>)
                        .required(true)
                        .help("The workspace identifier to analyze"),
                )
                .arg(
                    arg!(--"project-id" <ID>)
                        .required(true)
                        .help("The report project to run")
                        .env(PROJECT_ID_ENV),
                )
                .arg(
                    arg!(--"api-token" <TOKEN>)
                        .required(true)
                        .help("Bearer token for the report API")
                        .env(API_TOKEN_ENV)
                        .hide_env_values(true),
                )
                .arg(
                    arg!(--"base-url" <URL>)
                        .required(false)
                        .help("Report API base URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("30"),
                ),
        )
}
