// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! `summit`: command-line client for the Summit task marketplace.
//!
//! Each subcommand is one page: sign in, browse and act on tasks, manage
//! the profile, and look at credits.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use summit_client::{
    auth::SignUpOutcome,
    config::Config,
    models::{CreateProfileRequest, CreateTaskRequest, OAuthProvider, TaskAction},
    pages::{render_status, TaskFilter},
    services::DEFAULT_TRANSACTION_LIMIT,
    AppState,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "summit", about = "Summit task marketplace client")]
struct Cli {
    /// Summit backend base URL
    #[arg(long, env = "SUMMIT_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login(Credentials),
    /// Create an account
    Signup(Credentials),
    /// Start an OAuth sign-in and print the URL to open
    Oauth {
        provider: OAuthProvider,
        #[arg(long)]
        redirect_to: Option<String>,
    },
    /// Finish an OAuth sign-in with the `code` from the callback URL
    OauthCallback { code: String },
    Logout,
    /// Show who is signed in
    Status,
    /// Browse open tasks
    Tasks {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        skill: Option<String>,
    },
    /// List the skills on the task board
    Skills,
    Task(TaskCommand),
    /// Post a new task
    Post {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        skill: String,
        #[arg(long)]
        urgency: Option<String>,
        #[arg(long)]
        reward: i64,
    },
    /// Tasks you posted
    Posted,
    /// Tasks you claimed
    Claimed,
    Leaderboard,
    Rewards,
    /// Your credit history
    Transactions {
        #[arg(long, default_value_t = DEFAULT_TRANSACTION_LIMIT)]
        limit: u32,
    },
    Profile(ProfileCommand),
}

#[derive(Args, Debug)]
struct Credentials {
    email: String,
    /// Read from stdin when not given
    #[arg(long, env = "SUMMIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct TaskCommand {
    #[command(subcommand)]
    command: TaskSubcommand,
}

#[derive(Subcommand, Debug)]
enum TaskSubcommand {
    Show { task_id: String },
    Claim { task_id: String },
    Complete { task_id: String },
    Confirm { task_id: String },
    Cancel { task_id: String },
    Delete { task_id: String },
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Show,
    /// Create your profile after signing up
    Setup(ProfileForm),
    Update(ProfileForm),
}

#[derive(Args, Debug)]
struct ProfileForm {
    #[arg(long)]
    name: String,
    #[arg(long)]
    avatar_url: Option<String>,
    /// Repeat for each skill
    #[arg(long = "skill")]
    skills: Vec<String>,
}

impl ProfileForm {
    fn into_request(self) -> CreateProfileRequest {
        CreateProfileRequest::new(&self.name, self.avatar_url, &self.skills)
    }
}

impl Command {
    /// Public pages render without waiting for the session.
    fn is_public(&self) -> bool {
        matches!(
            self,
            Command::Tasks { .. } | Command::Skills | Command::Leaderboard | Command::Rewards
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url.trim_end_matches('/').to_string();
    }
    tracing::debug!(api_url = %config.api_url, "Starting Summit client");

    let app = AppState::from_config(config).context("Failed to initialize client")?;
    app.coordinator.start();
    if !cli.command.is_public() {
        app.coordinator.wait_until_ready().await;
    }

    let result = run(&app, cli.command).await;
    app.coordinator.dispose();

    println!("{}", result?);
    Ok(())
}

async fn run(app: &AppState, command: Command) -> anyhow::Result<String> {
    let pages = &app.pages;
    let coordinator = &app.coordinator;

    let output = match command {
        Command::Login(credentials) => {
            let password = password_or_prompt(credentials.password)?;
            let state = coordinator.sign_in(&credentials.email, &password).await?;
            render_status(&state)
        }
        Command::Signup(credentials) => {
            let password = password_or_prompt(credentials.password)?;
            match coordinator.sign_up(&credentials.email, &password).await? {
                SignUpOutcome::SignedIn(state) => render_status(&state),
                SignUpOutcome::ConfirmationRequired => {
                    "Check your email to confirm your account, then run `summit login`."
                        .to_string()
                }
            }
        }
        Command::Oauth {
            provider,
            redirect_to,
        } => {
            let redirect_to = redirect_to.unwrap_or_else(|| app.config.oauth_redirect.clone());
            let redirect = coordinator.sign_in_with_provider(provider, &redirect_to)?;
            format!(
                "Open this URL to continue with {}:\n{}\n\nThen run `summit oauth-callback <code>`.",
                redirect.provider, redirect.url
            )
        }
        Command::OauthCallback { code } => {
            let state = coordinator.complete_oauth(&code).await?;
            render_status(&state)
        }
        Command::Logout => {
            coordinator.sign_out().await?;
            "Signed out.".to_string()
        }
        Command::Status => render_status(&coordinator.state()),
        Command::Tasks { search, skill } => {
            pages.tasks(&TaskFilter { search, skill }).await?
        }
        Command::Skills => pages.skills().await?,
        Command::Task(task) => match task.command {
            TaskSubcommand::Show { task_id } => pages.task_detail(&task_id).await?,
            TaskSubcommand::Claim { task_id } => {
                pages.run_task_action(&task_id, TaskAction::Claim).await?
            }
            TaskSubcommand::Complete { task_id } => {
                pages.run_task_action(&task_id, TaskAction::Complete).await?
            }
            TaskSubcommand::Confirm { task_id } => {
                pages.run_task_action(&task_id, TaskAction::Confirm).await?
            }
            TaskSubcommand::Cancel { task_id } => {
                pages.run_task_action(&task_id, TaskAction::Cancel).await?
            }
            TaskSubcommand::Delete { task_id } => {
                pages.run_task_action(&task_id, TaskAction::Delete).await?
            }
        },
        Command::Post {
            title,
            description,
            skill,
            urgency,
            reward,
        } => {
            let request = CreateTaskRequest {
                title: title.trim().to_string(),
                description: description.trim().to_string(),
                skill: skill.trim().to_string(),
                urgency: urgency.filter(|u| !u.trim().is_empty()),
                credit_reward: reward,
            };
            pages.post_task(request).await?
        }
        Command::Posted => pages.my_posted().await?,
        Command::Claimed => pages.my_claimed().await?,
        Command::Leaderboard => pages.leaderboard().await?,
        Command::Rewards => pages.rewards().await?,
        Command::Transactions { limit } => pages.transactions(limit).await?,
        Command::Profile(profile) => match profile.command {
            ProfileSubcommand::Show => pages.profile().await?,
            ProfileSubcommand::Setup(form) => pages.setup_profile(form.into_request()).await?,
            ProfileSubcommand::Update(form) => pages.update_profile(form.into_request()).await?,
        },
    };
    Ok(output)
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read password")?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

/// Initialize logging on stderr. `SUMMIT_LOG_FORMAT=json` selects
/// structured JSON output.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("summit_client=info,summit=info,warn"));
    let json = std::env::var("SUMMIT_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
