// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;

use clinic_session::api::{ApiClient, ApiError};
use clinic_session::config::{self, ClientConfig};
use clinic_session::dashboard;
use clinic_session::error::{describe_api_error, describe_storage_error, ErrorBuilder};
use clinic_session::models::{Credentials, GalleryCategory};
use clinic_session::security::{SessionDriver, SessionManager, SessionNotice};
use clinic_session::storage::{FileTokenStore, StorageError, TokenStore};
use clinic_session::utils::truncate;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// Service unavailable - backend not reachable
    pub const SERVICE_UNAVAILABLE: i32 = 69;
    /// Permission denied - not signed in or session rejected
    pub const NO_PERM: i32 = 77;
    /// Configuration error - invalid or missing config
    pub const CONFIG: i32 = 78;
}

use exit_codes::*;

/// Spinner helpers for consistent progress indicators
mod spinner {
    use colored::Colorize;
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("\u{28FB}\u{28F9}\u{28FC}\u{28F8}\u{28FE}\u{28F6}\u{28F7}\u{28E7}\u{28CF}\u{28DF} ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }

    pub fn finish_success(spinner: &ProgressBar, message: &str) {
        spinner.finish_and_clear();
        println!("{} {}", "[OK]".green(), message);
    }

    pub fn clear(spinner: &ProgressBar) {
        spinner.finish_and_clear();
    }
}

#[derive(Parser)]
#[command(name = "clinic")]
#[command(version = VERSION)]
#[command(about = "Practice dashboard client. Signs you out after 10 minutes without activity.")]
#[command(long_about = "clinic - practice dashboard client\n\n\
    Sign in:             clinic login\n\
    Who am I:            clinic whoami\n\
    Stay signed in:      clinic watch\n\
    Declarations:        clinic declarations --search dana\n\
    Configure:           clinic config show\n\n\
    A warning appears after 9 minutes idle; 60 seconds later you are signed out.")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend URL for this run (overrides config and CLINIC_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Verbose mode: session events on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    ///
    /// Examples:
    ///   clinic login
    ///   clinic login --email leah@example.com
    Login {
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Sign out and forget the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Wake the backend host
    Ping,

    /// Keep an interactive session open with the inactivity watchdog
    ///
    /// Every line you type counts as activity. When the warning shows,
    /// press Enter (or type "continue") to stay signed in. Type "logout"
    /// to sign out, "quit" to leave without signing out.
    Watch,

    /// List health declarations
    ///
    /// Examples:
    ///   clinic declarations
    ///   clinic declarations --search 12345
    Declarations {
        /// Filter by name or id number
        #[arg(short, long)]
        search: Option<String>,
    },

    /// List or manage articles
    ///
    /// Examples:
    ///   clinic articles
    ///   clinic articles --all
    ///   clinic articles show 65f0c2...
    ///   clinic articles delete 65f0c2...
    Articles {
        /// Include unpublished drafts
        #[arg(long)]
        all: bool,

        #[command(subcommand)]
        command: Option<ArticleCommands>,
    },

    /// List or manage gallery images
    ///
    /// Examples:
    ///   clinic gallery
    ///   clinic gallery --category massage
    ///   clinic gallery --search "quiet room"
    ///   clinic gallery delete 65f0c2...
    Gallery {
        /// general, treatment_room, massage, reflexology, testimonials
        #[arg(short, long)]
        category: Option<GalleryCategory>,

        /// Match title, description or category
        #[arg(short, long)]
        search: Option<String>,

        #[command(subcommand)]
        command: Option<ItemCommands>,
    },

    /// Configure settings
    ///
    /// Examples:
    ///   clinic config show
    ///   clinic config set-url https://api.example.org
    ///   clinic config set-idle 540
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ArticleCommands {
    /// Show one article, drafts included
    Show { id: String },
    /// Delete by id
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ItemCommands {
    /// Delete by id
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set the backend URL
    SetUrl { url: String },
    /// Seconds of inactivity before the warning
    SetIdle { secs: u64 },
    /// Seconds the warning counts down before signing out
    SetCountdown { secs: u32 },
}

type Session = SessionManager<ApiClient, FileTokenStore>;

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn open_session(config: &ClientConfig) -> Result<Session> {
    let client = ApiClient::new(config.api_url.as_str(), config.request_timeout_secs)?;
    let store = FileTokenStore::new(config.token_path()?);
    Ok(SessionManager::new(client, store, config.watchdog()))
}

/// Restore the stored session or fail with a "not signed in" error.
async fn require_session(config: &ClientConfig) -> Result<Session> {
    let mut session = open_session(config)?;
    let sp = spinner::create("Checking session...");
    let restored = session.initialize(Instant::now()).await;
    spinner::clear(&sp);
    if !restored {
        return Err(ApiError::NotAuthenticated.into());
    }
    Ok(session)
}

async fn handle_login(config: &ClientConfig, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => inquire::Text::new("Email:").prompt().context("Login cancelled")?,
    };
    let password = inquire::Password::new("Password:")
        .without_confirmation()
        .prompt()
        .context("Login cancelled")?;

    let mut session = open_session(config)?;
    let sp = spinner::create("Signing in...");
    let result = session.login(&Credentials::new(email, password), Instant::now()).await;
    spinner::clear(&sp);

    let user = result?;
    println!("{} Signed in as {}", "[OK]".green(), user.display_name().bold());
    if let Some(message) = session.message() {
        println!("{} {}", "[!]".yellow(), message);
    }
    print_idle_policy(config);
    Ok(())
}

fn handle_logout(config: &ClientConfig) -> Result<()> {
    let mut session = open_session(config)?;
    let had_token = matches!(session.store().load(), Ok(Some(_)));
    session.logout(None);
    if had_token {
        println!("{} Signed out", "[OK]".green());
    } else {
        println!("{} Not signed in", "[!]".yellow());
    }
    Ok(())
}

async fn handle_whoami(config: &ClientConfig) -> Result<()> {
    let session = require_session(config).await?;
    if let Some(user) = session.user() {
        println!("{}", user.display_name().bold());
        if let Some(email) = &user.email {
            println!("  email: {}", email);
        }
        if let Some(role) = &user.role {
            println!("  role:  {}", role);
        }
    }
    print_idle_policy(config);
    Ok(())
}

async fn handle_ping(config: &ClientConfig) -> Result<()> {
    let client = ApiClient::new(config.api_url.as_str(), config.request_timeout_secs)?;
    let sp = spinner::create(&format!("Waking {}...", config.api_url));
    match client.ping().await {
        Ok(()) => {
            spinner::finish_success(&sp, "Backend is up");
            Ok(())
        }
        Err(e) => {
            spinner::clear(&sp);
            Err(e.into())
        }
    }
}

async fn handle_declarations(config: &ClientConfig, search: Option<String>) -> Result<()> {
    let mut session = require_session(config).await?;
    let all = dashboard::list_declarations(&mut session).await?;
    let shown = dashboard::filter_declarations(&all, search.as_deref().unwrap_or(""));

    if shown.is_empty() {
        println!("{}", "No declarations found.".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<12} {:<24} {:<12} {:<14} {}", "DATE", "NAME", "ID", "PHONE", "CONDITIONS").bold()
    );
    for declaration in &shown {
        let date = declaration
            .created_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        let conditions = declaration.health_conditions.reported();
        let conditions = if conditions.is_empty() {
            "none".dimmed().to_string()
        } else {
            truncate(&conditions.join(", "), 40).yellow().to_string()
        };
        println!(
            "{:<12} {:<24} {:<12} {:<14} {}",
            date,
            truncate(&declaration.name, 24),
            declaration.id_number,
            declaration.phone,
            conditions
        );
    }
    println!("{}", format!("{} of {} shown", shown.len(), all.len()).dimmed());
    Ok(())
}

async fn handle_articles(config: &ClientConfig, all: bool, command: Option<ArticleCommands>) -> Result<()> {
    let mut session = require_session(config).await?;

    match command {
        Some(ArticleCommands::Show { id }) => {
            let article = dashboard::get_article(&mut session, &id).await?;
            let status = if article.published {
                "published".green()
            } else {
                "draft".yellow()
            };
            println!("{} ({})", article.title.bold(), status);
            if let Some(updated) = article.updated_at.or(article.created_at) {
                println!("{}", updated.format("%Y-%m-%d %H:%M").to_string().dimmed());
            }
            if !article.summary.is_empty() {
                println!();
                println!("{}", article.summary.italic());
            }
            println!();
            println!("{}", article.content);
            return Ok(());
        }
        Some(ArticleCommands::Delete { id, yes }) => {
            if !confirm(&format!("Delete article {}?", id), yes)? {
                return Ok(());
            }
            dashboard::delete_article(&mut session, &id).await?;
            println!("{} Article deleted", "[OK]".green());
            return Ok(());
        }
        None => {}
    }

    let articles = dashboard::list_articles(&mut session, all).await?;
    if articles.is_empty() {
        println!("{}", "No articles.".dimmed());
        return Ok(());
    }
    for article in &articles {
        let status = if article.published {
            "published".green()
        } else {
            "draft".yellow()
        };
        println!("{:<26} {:<10} {}", article.id.dimmed(), status, truncate(&article.title, 50));
    }
    Ok(())
}

async fn handle_gallery(
    config: &ClientConfig,
    category: Option<GalleryCategory>,
    search: Option<String>,
    command: Option<ItemCommands>,
) -> Result<()> {
    let mut session = require_session(config).await?;

    if let Some(ItemCommands::Delete { id, yes }) = command {
        if !confirm(&format!("Delete image {}?", id), yes)? {
            return Ok(());
        }
        dashboard::delete_gallery_image(&mut session, &id).await?;
        println!("{} Image deleted", "[OK]".green());
        return Ok(());
    }

    let images = dashboard::list_gallery(&mut session).await?;
    let in_category: Vec<_> = dashboard::filter_gallery(&images, category)
        .into_iter()
        .cloned()
        .collect();
    let shown = dashboard::search_gallery(&in_category, search.as_deref().unwrap_or(""));
    if shown.is_empty() {
        println!("{}", "No images.".dimmed());
        return Ok(());
    }
    for image in shown {
        println!(
            "{:<26} {:<15} {:<40} {}",
            image.id.dimmed(),
            image.category.to_string(),
            truncate(&image.title, 40),
            image.image.as_deref().unwrap_or("-").dimmed()
        );
    }
    Ok(())
}

fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    let answer = inquire::Confirm::new(prompt)
        .with_default(false)
        .prompt()
        .context("Confirmation cancelled")?;
    Ok(answer)
}

/// Interactive session: stdin lines are activity, notices are rendered as
/// they arrive.
async fn handle_watch(config: &ClientConfig) -> Result<()> {
    let session = require_session(config).await?;
    let name = session
        .user()
        .map(|u| u.display_name().to_string())
        .unwrap_or_default();

    let (driver, handle, mut notices) = SessionDriver::new(session);
    let task = tokio::spawn(driver.run());

    println!("{} Signed in as {}", "[OK]".green(), name.bold());
    print_idle_policy(config);
    println!(
        "{}",
        "Type anything to stay active, \"logout\" to sign out, \"quit\" to leave.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut warning = false;

    loop {
        tokio::select! {
            notice = notices.recv() => {
                let Some(notice) = notice else { break };
                if render_notice(&notice, &mut warning) {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "quit" | "exit" => break,
                    "logout" => handle.logout(None).await,
                    "" | "continue" if warning => handle.continue_session().await,
                    _ => handle.activity(),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    handle.shutdown().await;
    let session = task.await.context("Session task failed")?;
    if session.is_authenticated() {
        println!("{}", "Session kept; run `clinic watch` to resume.".dimmed());
    }
    Ok(())
}

/// Print a notice. Returns true once the session has ended.
fn render_notice(notice: &SessionNotice, warning: &mut bool) -> bool {
    match notice {
        SessionNotice::WarningStarted { remaining } => {
            *warning = true;
            println!();
            println!(
                "{} You have been inactive for a while. Press Enter to stay signed in.",
                "[!]".yellow().bold()
            );
            print_countdown(*remaining);
            false
        }
        SessionNotice::CountdownTick { remaining } => {
            print_countdown(*remaining);
            false
        }
        SessionNotice::WarningDismissed => {
            *warning = false;
            println!();
            println!("{} Still here. Session extended.", "[OK]".green());
            false
        }
        SessionNotice::LoggedOut { kind, reason } => {
            *warning = false;
            println!();
            let reason = reason.as_deref().unwrap_or("Signed out.");
            if kind.is_forced() {
                println!("{} {}", "[✗]".red().bold(), reason);
            } else {
                println!("{} {}", "[OK]".green(), reason);
            }
            true
        }
    }
}

fn print_countdown(remaining: u32) {
    print!("\r    Signing out in {:>2}s ", remaining.to_string().bold());
    std::io::stdout().flush().ok();
}

fn print_idle_policy(config: &ClientConfig) {
    let watchdog = config.watchdog();
    println!(
        "{}",
        format!(
            "Idle warning after {}s, sign-out {}s later.",
            watchdog.idle_window.as_secs(),
            watchdog.countdown_secs
        )
        .dimmed()
    );
}

fn handle_config(command: Option<ConfigCommands>) -> Result<()> {
    let mut config = config::load_config()?;
    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => {
            let path = config::config_path()?;
            println!("{}", "Configuration".bold());
            println!("  file:           {}", path.display());
            println!("  api_url:        {}", config.api_url);
            println!("  timeout:        {}s", config.request_timeout_secs);
            println!("  idle warning:   {}s", config.idle_warning_secs);
            println!("  countdown:      {}s", config.countdown_secs);
            println!(
                "  max idle life:  {}s",
                config.watchdog().max_session_lifetime().as_secs()
            );
            println!("  token file:     {}", config.token_path()?.display());
            return Ok(());
        }
        ConfigCommands::SetUrl { url } => config.api_url = url,
        ConfigCommands::SetIdle { secs } => config.idle_warning_secs = secs,
        ConfigCommands::SetCountdown { secs } => config.countdown_secs = secs,
    }
    config::save_config(&config)?;
    println!("{} Configuration saved", "[OK]".green());
    Ok(())
}

async fn run(cli: Cli, config: ClientConfig) -> Result<()> {
    match cli.command {
        Commands::Login { email } => handle_login(&config, email).await,
        Commands::Logout => handle_logout(&config),
        Commands::Whoami => handle_whoami(&config).await,
        Commands::Ping => handle_ping(&config).await,
        Commands::Watch => handle_watch(&config).await,
        Commands::Declarations { search } => handle_declarations(&config, search).await,
        Commands::Articles { all, command } => handle_articles(&config, all, command).await,
        Commands::Gallery {
            category,
            search,
            command,
        } => handle_gallery(&config, category, search, command).await,
        Commands::Config { command } => handle_config(command),
    }
}

/// Print an error with causes and fixes and pick an exit code.
fn report(error: &anyhow::Error) -> i32 {
    if let Some(api) = error.downcast_ref::<ApiError>() {
        eprintln!("{}", describe_api_error(api).build().red());
        return match api {
            ApiError::Network(_) => SERVICE_UNAVAILABLE,
            ApiError::TokenRejected | ApiError::NotAuthenticated | ApiError::Credentials(_) => NO_PERM,
            _ => ERROR,
        };
    }
    if let Some(storage) = error.downcast_ref::<StorageError>() {
        eprintln!("{}", describe_storage_error(storage).build().red());
        return ERROR;
    }

    let mut builder = ErrorBuilder::new(error.to_string());
    for cause in error.chain().skip(1) {
        builder = builder.cause(cause.to_string());
    }
    eprintln!("{}", builder.build().red());
    ERROR
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config::load_config() {
        Ok(mut config) => {
            if let Some(url) = &cli.api_url {
                config.api_url = url.clone();
            }
            config
        }
        Err(e) => {
            eprintln!(
                "{}",
                ErrorBuilder::new(format!("Invalid configuration: {:#}", e))
                    .fix("Inspect it: clinic config show")
                    .fix("Or delete ~/.clinic/config.json to start over")
                    .build()
                    .red()
            );
            std::process::exit(CONFIG);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{} Failed to create Tokio runtime: {}", "[✗]".red(), e);
            std::process::exit(ERROR);
        }
    };

    if let Err(e) = runtime.block_on(run(cli, config)) {
        std::process::exit(report(&e));
    }
}
