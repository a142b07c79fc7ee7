use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use welfare_auth::backend::BackendError;
use welfare_auth::backend::supabase::SupabaseBackend;
use welfare_auth::config::{AuthConfig, ConfigError};
use welfare_auth::notify::{EdgeFunctionNotifier, NotifyError};
use welfare_auth::{AuthContext, AuthError, Role, SignUp, SignUpOutcome};

const DEFAULT_SESSION_FILE: &str = ".welfare-session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("backend setup failed: {0}")]
    Backend(#[from] BackendError),
    #[error("notifier setup failed: {0}")]
    Notify(#[from] NotifyError),
    #[error("{0}")]
    Auth(#[from] AuthError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "welfare", about = "Sengani Girls Welfare Group account CLI")]
struct Cli {
    /// Where the session is kept between runs. Overrides `SESSION_FILE`.
    #[arg(long)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account. Admin accounts wait for approval.
    Signup(SignupArgs),
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long, env = "WELFARE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Signout,
    /// Print the current access state.
    Status,
    /// Re-check whether a pending administrator has been approved.
    Refresh,
    Otp(OtpCommand),
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    email: String,
    #[arg(long, env = "WELFARE_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    phone: String,
    #[arg(long, value_enum, default_value_t = RoleArg::Member)]
    role: RoleArg,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RoleArg {
    Member,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Member => Self::Member,
            RoleArg::Admin => Self::Admin,
        }
    }
}

#[derive(Args, Debug)]
struct OtpCommand {
    #[command(subcommand)]
    command: OtpSubcommand,
}

#[derive(Subcommand, Debug)]
enum OtpSubcommand {
    /// Issue a code. No SMS gateway is wired up, so the code is printed.
    Send {
        #[arg(long)]
        phone: String,
    },
    Verify {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut config = AuthConfig::from_env()?;
    if let Some(path) = cli.session_file {
        config.session_file = Some(path);
    }
    config.session_file.get_or_insert_with(|| PathBuf::from(DEFAULT_SESSION_FILE));

    let ctx = connect(&config)?;
    if let Err(e) = ctx.restore().await {
        eprintln!("warning: {e}");
    }

    match cli.command {
        Command::Signup(args) => run_signup(&ctx, args).await?,
        Command::Signin { email, password } => {
            ctx.sign_in(&email, &password).await?;
        }
        Command::Signout => ctx.sign_out().await?,
        Command::Status => {}
        Command::Refresh => {
            ctx.refresh_profile().await?;
        }
        Command::Otp(otp) => return run_otp(&ctx, otp).await,
    }

    print_json(&serde_json::to_value(ctx.settled().await)?)
}

fn connect(config: &AuthConfig) -> Result<AuthContext, CliError> {
    let backend = SupabaseBackend::from_config(config)?;
    let notifier = EdgeFunctionNotifier::from_config(config)?;
    Ok(AuthContext::new(Arc::new(backend), Arc::new(notifier), config.admin_email.clone()))
}

async fn run_signup(ctx: &AuthContext, args: SignupArgs) -> Result<(), CliError> {
    let input = SignUp {
        email: args.email,
        password: args.password,
        full_name: args.full_name,
        phone: args.phone,
        role: args.role.into(),
    };
    match ctx.sign_up(input).await? {
        SignUpOutcome::Created { identity } => eprintln!("account created: {}", identity.email),
        SignUpOutcome::CreatedAndNotified { identity } => {
            eprintln!("account created: {}; the administrator has been asked to approve it", identity.email);
        }
        SignUpOutcome::CreatedNotificationFailed { identity, error } => {
            eprintln!("account created: {}; {error}", identity.email);
        }
    }
    Ok(())
}

async fn run_otp(ctx: &AuthContext, otp: OtpCommand) -> Result<(), CliError> {
    match otp.command {
        OtpSubcommand::Send { phone } => {
            let issued = ctx.send_otp(&phone).await?;
            print_json(&serde_json::json!({
                "phone": issued.phone,
                "code": issued.code,
                "expires_at": issued.expires_at.unix_timestamp(),
            }))
        }
        OtpSubcommand::Verify { phone, code } => {
            ctx.verify_otp(&phone, &code).await?;
            print_json(&serde_json::json!({ "verified": true }))
        }
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
