mod cli;
mod commands;
mod config;
mod context;
mod output;
mod session_file;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use unistay_auth::RoleGuard;

use cli::{Cli, Commands, OutputFormat};
use config::{ConfigStore, ProfileConfig, config_dir};
use context::SessionContext;
use output::print_error;
use session_file::SessionFile;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "unistay=debug,unistay_auth=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let profile = cli.profile.as_str();
    let dir = config_dir()?;
    let configs = ConfigStore::in_dir(&dir);
    let profile_cfg = configs.load_profile(profile)?;
    let format = cli
        .format
        .or_else(|| profile_cfg.format.as_deref().and_then(|f| f.parse().ok()))
        .unwrap_or_default();

    match &cli.command {
        Commands::Routes => return commands::guard::routes(&RoleGuard::default(), format),
        Commands::Config(args) => {
            return configure(&configs, profile, profile_cfg, &args.command);
        }
        _ => {}
    }

    let file = SessionFile::in_dir(&dir, profile);
    let stored_api = file.load()?.map(|s| s.api);
    let api = config::resolve_api(cli.api.as_deref(), &profile_cfg, stored_api.as_deref())?;
    let ctx = SessionContext::open(api, file).await?;

    let result = match &cli.command {
        Commands::Login(args) => commands::auth::login(&ctx, args, format).await,
        Commands::Logout => {
            commands::auth::logout(&ctx);
            Ok(())
        }
        Commands::Whoami => commands::auth::whoami(&ctx, profile, format),
        Commands::SelectRole(args) => commands::auth::select_role(&ctx, &args.role, format).await,
        Commands::Refresh => commands::auth::refresh(&ctx).await,
        Commands::Open(args) => commands::guard::open(&ctx, &args.path, format),
        Commands::Routes | Commands::Config(_) => Ok(()),
    };

    // Persist even when the command failed: a rejected refresh signs out.
    ctx.persist()?;
    result
}

fn configure(
    configs: &ConfigStore,
    profile: &str,
    mut cfg: ProfileConfig,
    command: &cli::ConfigCommands,
) -> Result<()> {
    match command {
        cli::ConfigCommands::Show => {
            println!("{}: {}", "Profile".cyan(), profile);
            println!(
                "{}: {}",
                "API".cyan(),
                cfg.api.as_deref().unwrap_or("(not set)")
            );
            println!(
                "{}: {}",
                "Format".cyan(),
                cfg.format.as_deref().unwrap_or("text")
            );
        }
        cli::ConfigCommands::Set(set_args) => {
            match set_args.key.as_str() {
                "api" => cfg.api = Some(set_args.value.clone()),
                "format" => {
                    set_args
                        .value
                        .parse::<OutputFormat>()
                        .map_err(|e| anyhow::anyhow!("Invalid format: {e}"))?;
                    cfg.format = Some(set_args.value.clone());
                }
                other => anyhow::bail!("Unknown config key: {other}. Valid keys: api, format"),
            }
            configs.save_profile(profile, &cfg)?;
            output::print_success(&format!("Set {} = {}", set_args.key, set_args.value));
        }
    }
    Ok(())
}
