use clap::ArgMatches;
use commands::command_argument_builder;
use gossamer_core::config::load_config;
use gossamer_core::jobs;
use std::path::Path;

mod commands;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();

    match chosen_command.subcommand() {
        Some(("run", primary_command)) => handle_run(primary_command).await,
        Some(("check", primary_command)) => handle_check(primary_command),
        None => {
            eprintln!("No command given. Try `gossamer run --config config.yaml`.");
        }
        _ => unreachable!("clap should ensure we don't get here"),
    }
}

async fn handle_run(args: &ArgMatches) {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let config_path = expand_config_path(args);
    let only_source = args.get_one::<String>("source").map(|s| s.as_str());
    let quiet = args.get_flag("quiet");

    let config = match load_config(Path::new(&config_path)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = jobs::run_config(&config, only_source, !quiet).await {
        eprintln!("Crawler run failed: {:#}", e);
        std::process::exit(1);
    }
}

fn handle_check(args: &ArgMatches) {
    let config_path = expand_config_path(args);
    match load_config(Path::new(&config_path)) {
        Ok(config) => {
            println!("Configuration OK: {}", config_path);
            for (kind, job) in &config.crawler {
                println!("  {}:", kind.as_str());
                for (name, source) in &job.sources {
                    println!(
                        "    {} ({} targets, output {})",
                        name,
                        source.targets.len(),
                        source.output_dir.display()
                    );
                }
            }
        }
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn expand_config_path(args: &ArgMatches) -> String {
    let raw = args
        .get_one::<String>("config")
        .expect("config has a default value");
    shellexpand::tilde(raw).into_owned()
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
