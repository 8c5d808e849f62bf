//! Command handlers: each resolves its input, calls one service and prints
//! the result as JSON on stdout.

use std::path::Path;

use quire::{
    application::{admin::ArticleDraft, error::AppError},
    config::{
        AdminCommand, ArticlesCommand, AuthCommand, Command, ContentArgs, CreateArgs, ListArgs,
        PasswordArgs, UpdateArgs,
    },
    domain::{
        articles::ArticleFilter,
        entities::ArticlePatch,
        session::{Session, SessionUser},
        types::ArticleId,
    },
    infra::error::InfraError,
};
use serde::Serialize;
use serde_json::json;
use time::OffsetDateTime;

use crate::Services;

pub(crate) async fn dispatch(services: &Services, command: Command) -> Result<(), AppError> {
    match command {
        Command::Articles(command) => articles(services, command).await,
        Command::Archive => print_json(&services.articles.archive().await?),
        Command::Auth(command) => auth(services, command).await,
        Command::Admin(command) => admin(services, command).await,
    }
}

async fn articles(services: &Services, command: ArticlesCommand) -> Result<(), AppError> {
    match command {
        ArticlesCommand::List(args) => {
            let ListArgs {
                page,
                per_page,
                tag,
                year,
                search,
            } = args;
            let filter = ArticleFilter::new(tag, year, search);
            let request = services.articles.page_request(page, per_page)?;
            print_json(&services.articles.list(&filter, request).await?)
        }
        ArticlesCommand::Show { id } => {
            // A stored session lets the signed-in editor read drafts.
            let session = services.auth.session_for_reading().await?;
            let article = services
                .articles
                .detail(ArticleId(id), session.as_ref())
                .await?;
            print_json(&article)
        }
        ArticlesCommand::Filters => print_json(&services.articles.filter_options().await?),
        ArticlesCommand::All => print_json(&services.articles.all_published().await?),
    }
}

async fn auth(services: &Services, command: AuthCommand) -> Result<(), AppError> {
    match command {
        AuthCommand::Login(args) => {
            let password = read_password(&args.password).await?;
            let session = services.auth.login(&args.email, &password).await?;
            print_json(&SessionView::new(&session, services))
        }
        AuthCommand::MagicLink(args) => {
            services.auth.send_magic_link(&args.email).await?;
            print_json(&json!({ "sent": true, "email": args.email }))
        }
        AuthCommand::SignUp(args) => {
            let password = read_password(&args.password).await?;
            print_json(&services.auth.sign_up(&args.email, &password).await?)
        }
        AuthCommand::Logout => {
            let signed_out = services.auth.logout().await?;
            print_json(&json!({ "signed_out": signed_out }))
        }
        AuthCommand::Whoami => match services.auth.current_session().await? {
            Some(session) => print_json(&SessionView::new(&session, services)),
            None => print_json(&json!({ "signed_in": false })),
        },
        AuthCommand::ResetPassword(args) => {
            services.auth.send_password_reset(&args.email).await?;
            print_json(&json!({ "sent": true, "email": args.email }))
        }
        AuthCommand::UpdatePassword(args) => {
            let session = services.auth.require_session().await?;
            let password = read_password(&args).await?;
            let user = services.auth.update_password(&session, &password).await?;
            print_json(&user)
        }
    }
}

async fn admin(services: &Services, command: AdminCommand) -> Result<(), AppError> {
    let session = services.auth.require_session().await?;
    match command {
        AdminCommand::Create(args) => {
            let draft = draft_from_args(args).await?;
            print_json(&services.admin.create(&session, draft).await?)
        }
        AdminCommand::Update(args) => {
            let id = ArticleId(args.id);
            let patch = patch_from_args(args).await?;
            print_json(&services.admin.update(&session, id, patch).await?)
        }
        AdminCommand::Delete { id } => {
            print_json(&services.admin.delete(&session, ArticleId(id)).await?)
        }
    }
}

/// Signed-in identity as shown to the user. Tokens stay in the session file.
#[derive(Debug, Serialize)]
struct SessionView<'a> {
    signed_in: bool,
    user: &'a SessionUser,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    is_admin: bool,
}

impl<'a> SessionView<'a> {
    fn new(session: &'a Session, services: &Services) -> Self {
        Self {
            signed_in: true,
            user: &session.user,
            expires_at: session.expires_at,
            is_admin: services.admin.is_admin(session),
        }
    }
}

async fn draft_from_args(args: CreateArgs) -> Result<ArticleDraft, AppError> {
    let content = read_content(&args.content)
        .await?
        .ok_or_else(|| AppError::validation("article content is required (--content or --content-file)"))?;

    Ok(ArticleDraft {
        title: args.title,
        excerpt: args.excerpt,
        content,
        tag: args.tag,
        publish: !args.draft,
    })
}

async fn patch_from_args(args: UpdateArgs) -> Result<ArticlePatch, AppError> {
    let is_published = args.published();
    let content = read_content(&args.content).await?;
    Ok(ArticlePatch {
        title: args.title,
        excerpt: args.excerpt,
        content,
        tag: args.tag,
        is_published,
    })
}

async fn read_content(args: &ContentArgs) -> Result<Option<String>, AppError> {
    if let Some(path) = args.content_file.as_deref() {
        return read_file(path).await.map(Some);
    }
    Ok(args.content.clone())
}

async fn read_password(args: &PasswordArgs) -> Result<String, AppError> {
    if let Some(path) = args.password_file.as_deref() {
        let raw = read_file(path).await?;
        return Ok(raw.lines().next().unwrap_or_default().to_string());
    }
    args.password_env
        .clone()
        .ok_or_else(|| AppError::validation("password required: pass --password-file or set QUIRE_PASSWORD"))
}

async fn read_file(path: &Path) -> Result<String, AppError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|err| AppError::validation(format!("failed to read `{}`: {err}", path.display())))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| InfraError::Io(err.into()))?;
    println!("{out}");
    Ok(())
}
