//! Chess CLI - administration commands
//!
//! Usage:
//!   chess user create --email <email> --password <pw> --first-name <n> --last-name <n> --role <role>
//!   chess user deactivate <id>
//!   chess hash-password <plaintext>
//!   chess token issue <user-id>
//!   chess token inspect <token> [--kind access|refresh]
//!
//! Configuration comes from the same environment variables as the server.

use anyhow::{bail, Context};
use chess_api::auth::{
    validate_password_strength, PasswordHasher, RegisterRequest, TokenKind, Verification,
};
use chess_api::state::AppState;
use chess_core::{AppConfig, Role, UserDirectory};
use chrono::DateTime;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "chess")]
#[command(about = "Chess tournament service administration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage user accounts
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Print the Argon2id hash of a password
    HashPassword {
        /// Plaintext password
        password: String,
    },
    /// Issue or inspect tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create an account with any role, including admin
    Create {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// jugador, organizador, arbitro or admin
        #[arg(long, default_value = "jugador", value_parser = parse_role)]
        role: Role,
    },
    /// Deactivate an account
    Deactivate { id: i64 },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue an access/refresh pair for a stored user
    Issue { user_id: i64 },
    /// Verify a token and print its claims
    Inspect {
        token: String,
        #[arg(long, value_enum, default_value_t = KindArg::Access)]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Access,
    Refresh,
}

impl From<KindArg> for TokenKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Access => TokenKind::Access,
            KindArg::Refresh => TokenKind::Refresh,
        }
    }
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| {
        let known: Vec<&str> = Role::ALL.iter().map(Role::as_str).collect();
        format!("unknown role '{s}', expected one of: {}", known.join(", "))
    })
}

fn load_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    AppState::new(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,audit=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::User { action } => {
            let state = load_state()?;
            match action {
                UserAction::Create {
                    email,
                    password,
                    first_name,
                    last_name,
                    role,
                } => {
                    let user = state
                        .auth
                        .create_user(RegisterRequest {
                            email,
                            password,
                            first_name,
                            last_name,
                            role: Some(role),
                        })
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&user)?);
                }
                UserAction::Deactivate { id } => {
                    let user = state.auth.set_active(id, false, None).await?;
                    println!("Deactivated user {} <{}>", user.id, user.email);
                }
            }
        }
        Commands::HashPassword { password } => {
            if let Err(message) = validate_password_strength(&password) {
                bail!(message);
            }
            let config = AppConfig::from_env().context("Invalid configuration")?;
            let hasher = PasswordHasher::new(&config.auth.password)?;
            println!("{}", hasher.hash(&password)?);
        }
        Commands::Token { action } => {
            let state = load_state()?;
            match action {
                TokenAction::Issue { user_id } => {
                    let user = state
                        .store
                        .find_user_by_id(user_id)
                        .await?
                        .with_context(|| format!("User {user_id} not found"))?;
                    if !user.active {
                        bail!("User {user_id} is inactive");
                    }
                    let pair = state.tokens.issue_pair(user.id, &user.email, user.role)?;
                    println!("{}", serde_json::to_string_pretty(&pair)?);
                }
                TokenAction::Inspect { token, kind } => {
                    match state.tokens.verify(&token, kind.into()) {
                        Verification::Valid(claims) => {
                            println!("{}", serde_json::to_string_pretty(&claims)?);
                            if let Some(expires) = DateTime::from_timestamp(claims.exp as i64, 0) {
                                println!("expires at {}", expires.to_rfc3339());
                            }
                        }
                        Verification::Invalid(reason) => bail!("Invalid token: {reason}"),
                    }
                }
            }
        }
    }

    Ok(())
}
