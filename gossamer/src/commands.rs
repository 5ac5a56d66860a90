use crate::CLAP_STYLING;
use clap::{arg, command};

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("gossamer")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("gossamer")
        .styles(CLAP_STYLING)
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Run every crawler job defined in the configuration file, in order: \
                URL extraction, page archiving, image and text extraction.",
                )
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to the configuration file")
                        .default_value("config.yaml"),
                )
                .arg(
                    arg!(-s --"source" <NAME>)
                        .required(false)
                        .help("Restrict the run to a single named source"),
                )
                .arg(
                    arg!(-q --"quiet" "Suppress progress bars and non-essential output")
                        .required(false),
                ),
        )
        .subcommand(
            command!("check")
                .about("Load and validate the configuration file, then print the job plan")
                .arg(
                    arg!(-c --"config" <PATH>)
                        .required(false)
                        .help("Path to the configuration file")
                        .default_value("config.yaml"),
                ),
        )
}
