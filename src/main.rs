use std::{process, sync::Arc};

use quire::{
    application::{
        admin::AdminArticleService, articles::ArticleService, auth::AuthService, error::AppError,
    },
    config::{self, Settings},
    domain::session::AdminPolicy,
    infra::{
        error::InfraError, session_store::FileSessionStore, supabase::SupabaseClient, telemetry,
    },
};
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

mod commands;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(
            error = %error,
            summary = error.presentation_message(),
            origin = report.source,
            chain = ?report.messages,
            "command failed"
        );
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(
            error = %error,
            summary = error.presentation_message(),
            "command failed"
        );
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(|err| {
        InfraError::configuration(format!("failed to load configuration: {err}"))
    })?;

    telemetry::init(&settings.logging)?;
    debug!(
        supabase = %settings.supabase.url,
        timezone = %settings.site.timezone,
        "configuration loaded"
    );

    let services = Services::build(&settings)?;
    commands::dispatch(&services, cli_args.command).await
}

/// Services wired against the configured Supabase project.
pub(crate) struct Services {
    pub articles: ArticleService,
    pub auth: AuthService,
    pub admin: AdminArticleService,
}

impl Services {
    fn build(settings: &Settings) -> Result<Self, AppError> {
        let supabase = Arc::new(SupabaseClient::new(&settings.supabase)?);
        let sessions = Arc::new(FileSessionStore::new(settings.auth.session_file.clone()));

        let articles = ArticleService::new(
            supabase.clone(),
            settings.site.timezone,
            settings.site.page_size,
        );
        let auth = AuthService::new(
            supabase.clone(),
            sessions,
            settings.auth.redirect_base.clone(),
        );
        let admin = AdminArticleService::new(
            supabase,
            AdminPolicy::new(settings.auth.admin_emails.iter()),
        );

        Ok(Self {
            articles,
            auth,
            admin,
        })
    }
}
