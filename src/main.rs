mod cli;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ConfigCommands};

/// Logs go to stderr so stdout stays clean for JSON/CSV output. `RUST_LOG`
/// overrides the level picked by `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.config.as_deref();

    let result = match &cli.command {
        Commands::Process(args) => cli::process::run(args, config),
        Commands::Rules {
            rules,
            replace_defaults,
        } => cli::rules::list(rules.as_deref(), *replace_defaults, config),
        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config::show(config),
            ConfigCommands::Init { force } => cli::config::init(config, *force),
        },
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "txnorm", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
