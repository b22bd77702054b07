use std::time::Duration;

use clap::Parser;
use smart_locator::cli::commands::{
    cmd_batch, cmd_fingerprint, cmd_generate_test, cmd_list, cmd_resolve, cmd_run,
};
use smart_locator::cli::config::{Cli, Commands, load_config};
use smart_locator::cli::logging::init_logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // CLI > config file > defaults
    let mut config = load_config(cli.config.as_deref());
    config.apply_cli(&cli);

    match cli.command {
        Commands::Fingerprint {
            url,
            category,
            use_auth,
            allow_redirects,
        } => {
            cmd_fingerprint(&config, &url, &category, use_auth, allow_redirects)?;
        }
        Commands::GenerateTest {
            description,
            file_name,
            fingerprint,
            requires_login,
        } => {
            cmd_generate_test(
                &config,
                &description,
                &file_name,
                fingerprint.as_deref(),
                requires_login,
            )?;
        }
        Commands::Resolve {
            url,
            category,
            key,
            use_auth,
        } => {
            cmd_resolve(&config, &url, &category, &key, use_auth)?;
        }
        Commands::Run {
            url,
            instruction,
            use_auth,
        } => {
            cmd_run(&config, &url, &instruction, use_auth)?;
        }
        Commands::List => cmd_list(&config)?,
        Commands::Batch { jobs, timeout_secs } => {
            let all_complete = cmd_batch(&config, &jobs, Duration::from_secs(timeout_secs))?;
            if !all_complete {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
