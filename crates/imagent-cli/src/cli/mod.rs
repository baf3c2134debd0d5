//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use imagent_core::config::Config;

mod commands;

#[derive(Parser)]
#[command(name = "imagent")]
#[command(version)]
#[command(about = "Client for the imagent image-editing agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create an account (requests a verification code when none is given)
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Verification code received by email
        #[arg(long)]
        code: Option<String>,
        /// CAPTCHA token from the verification widget
        #[arg(long)]
        captcha_token: Option<String>,
    },
    /// Request an email verification code
    SendCode {
        #[arg(long)]
        email: String,
    },
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Log out and clear the stored session
    Logout,
    /// Show whether a session is stored
    Status,
    /// Run the agent on an image
    Edit {
        /// What to do to the image
        #[arg(short, long)]
        prompt: String,
        /// Path to the input image
        #[arg(short, long)]
        image: String,
        /// Where to write the edited image (defaults next to the input)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Print the config file path
    Path,
    /// Print the effective configuration
    Show,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("load config")?;
    init_tracing(&config);

    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli, &config).await })
}

fn init_tracing(config: &Config) {
    use tracing_subscriber::EnvFilter;

    let directives = std::env::var("IMAGENT_LOG")
        .ok()
        .or_else(|| config.log_filter.clone())
        .unwrap_or_else(|| "warn".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(cli: Cli, config: &Config) -> Result<()> {
    match cli.command {
        Commands::Signup {
            email,
            password,
            code,
            captcha_token,
        } => {
            commands::auth::signup(
                config,
                &email,
                &password,
                code.as_deref(),
                captcha_token.as_deref(),
            )
            .await
        }
        Commands::SendCode { email } => commands::auth::send_code(config, &email).await,
        Commands::Login { email, password } => {
            commands::auth::login(config, &email, &password).await
        }
        Commands::Logout => commands::auth::logout(),
        Commands::Status => commands::auth::status(),
        Commands::Edit {
            prompt,
            image,
            output,
        } => commands::edit::run(config, &prompt, &image, output.as_deref()).await,
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Show => commands::config::show(config),
        },
    }
}
