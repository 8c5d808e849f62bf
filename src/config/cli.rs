use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the quire binary.
#[derive(Debug, Parser)]
#[command(name = "quire", version, about = "Read and edit a Supabase-backed blog")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "QUIRE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the Supabase project URL.
    #[arg(long = "supabase-url", value_name = "URL", global = true)]
    pub supabase_url: Option<String>,

    /// Override the site timezone used for archive and year filters.
    #[arg(long = "timezone", value_name = "TZ", global = true)]
    pub timezone: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Browse published articles.
    #[command(subcommand)]
    Articles(ArticlesCommand),
    /// Print published articles grouped by year, month and day.
    Archive,
    /// Manage the editor session.
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Create, edit and delete articles as the signed-in editor.
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Debug, Subcommand, Clone)]
pub enum ArticlesCommand {
    /// List published articles, newest first.
    List(ListArgs),
    /// Show one article by id.
    Show {
        #[arg(value_name = "ID")]
        id: i64,
    },
    /// Print the years and tags available as listing filters.
    Filters,
    /// Print every published article with its full content.
    All,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListArgs {
    /// One-based page number.
    #[arg(long, value_name = "N")]
    pub page: Option<u32>,

    /// Page size; defaults to `site.page_size`.
    #[arg(long = "per-page", value_name = "N")]
    pub per_page: Option<u32>,

    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Calendar year in the site timezone.
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Case-insensitive match on title, excerpt and content.
    #[arg(long, value_name = "TERM")]
    pub search: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum AuthCommand {
    /// Sign in with email and password.
    Login(CredentialArgs),
    /// Email a one-time sign-in link.
    #[command(name = "magic-link")]
    MagicLink(EmailArgs),
    /// Register a new editor account.
    #[command(name = "sign-up")]
    SignUp(CredentialArgs),
    /// Sign out and forget the stored session.
    Logout,
    /// Print the signed-in user, refreshing the session when needed.
    Whoami,
    /// Email a password reset link.
    #[command(name = "reset-password")]
    ResetPassword(EmailArgs),
    /// Change the signed-in user's password.
    #[command(name = "update-password")]
    UpdatePassword(PasswordArgs),
}

#[derive(Debug, Args, Clone)]
pub struct EmailArgs {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,
}

#[derive(Debug, Args, Clone)]
pub struct CredentialArgs {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,

    #[command(flatten)]
    pub password: PasswordArgs,
}

/// Passwords never travel as plain arguments: read them from a file or
/// from `QUIRE_PASSWORD`.
#[derive(Debug, Args, Default, Clone)]
pub struct PasswordArgs {
    /// File whose first line is the password.
    #[arg(long = "password-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub password_file: Option<PathBuf>,

    #[arg(long = "password-env", env = "QUIRE_PASSWORD", hide = true, hide_env_values = true)]
    pub password_env: Option<String>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum AdminCommand {
    /// Create an article.
    Create(CreateArgs),
    /// Update fields of an existing article.
    Update(UpdateArgs),
    /// Delete an article you own, or any article as an admin.
    Delete {
        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentArgs {
    /// Inline article body.
    #[arg(long, value_name = "TEXT", conflicts_with = "content_file")]
    pub content: Option<String>,

    /// Read the article body from a file.
    #[arg(long = "content-file", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub content_file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    #[arg(long, value_name = "TITLE")]
    pub title: String,

    #[command(flatten)]
    pub content: ContentArgs,

    #[arg(long, value_name = "TEXT")]
    pub excerpt: Option<String>,

    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    /// Keep the article unpublished.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub draft: bool,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    #[arg(value_name = "ID")]
    pub id: i64,

    #[arg(long, value_name = "TITLE")]
    pub title: Option<String>,

    #[command(flatten)]
    pub content: ContentArgs,

    #[arg(long, value_name = "TEXT")]
    pub excerpt: Option<String>,

    #[arg(long, value_name = "TAG")]
    pub tag: Option<String>,

    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "unpublish")]
    pub publish: bool,

    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub unpublish: bool,
}

impl UpdateArgs {
    pub fn published(&self) -> Option<bool> {
        match (self.publish, self.unpublish) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}
