use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "unistay")]
#[command(about = "UniStay CLI: sign in, pick a role and check where you may go")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backend API base URL (overrides config and UNISTAY_API_URL env var)
    #[arg(short, long, global = true, env = "UNISTAY_API_URL")]
    pub api: Option<String>,

    /// Config profile name
    #[arg(short, long, global = true, env = "UNISTAY_PROFILE", default_value = "default")]
    pub profile: String,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log requests and session changes to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login(LoginArgs),
    /// Sign out (remove the stored session)
    Logout,
    /// Show the current session
    Whoami,
    /// Choose a role for a newly registered account
    SelectRole(SelectRoleArgs),
    /// Obtain a fresh access token now
    Refresh,
    /// Ask the guard whether the current session may open a path
    Open(OpenArgs),
    /// List protected routes and the roles allowed on each
    Routes,
    /// Manage CLI configuration
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Account email
    #[arg(short, long)]
    pub email: String,
    /// Password
    #[arg(long, env = "UNISTAY_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(clap::Args)]
pub struct SelectRoleArgs {
    /// Role to take: student, landlord or agent
    pub role: String,
}

#[derive(clap::Args)]
pub struct OpenArgs {
    /// Path to open, e.g. /dashboard/landlord/units
    pub path: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show current config
    Show,
    /// Set config value
    Set(ConfigSetArgs),
}

#[derive(clap::Args)]
pub struct ConfigSetArgs {
    /// Key to set (api, format)
    pub key: String,
    /// Value
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_open() {
        let cli = Cli::try_parse_from(["unistay", "open", "/dashboard/agent", "-f", "json"]).unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
        assert_eq!(cli.profile, "default");
        match cli.command {
            Commands::Open(args) => assert_eq!(args.path, "/dashboard/agent"),
            _ => panic!("expected open"),
        }
    }

    #[test]
    fn test_parse_select_role() {
        let cli = Cli::try_parse_from(["unistay", "select-role", "landlord", "-p", "work"]).unwrap();
        assert_eq!(cli.profile, "work");
        assert!(matches!(cli.command, Commands::SelectRole(ref a) if a.role == "landlord"));
    }
}
