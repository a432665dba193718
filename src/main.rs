use std::{process, sync::Arc};

use pagebits::{
    application::{
        assemble::ContextAssembler,
        content::ContentService,
        error::AppError,
        events::ContentNotifier,
        groups::{GroupCacheConfig, GroupRepository},
        pages::PageService,
        repos::{GroupsRepo, GroupsWriteRepo, PagesRepo, PagesWriteRepo, TemplatesRepo},
    },
    cache::{CacheStore, MokaStore},
    config,
    domain::entities::LoadedGroup,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState, HttpState},
        telemetry,
        templates::TemplateEngine,
        uploads::{MediaUrls, UploadStorage},
    },
};
use tokio::try_join;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(target = "pagebits::migrate", "database schema is up to date");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings).await?;
    serve_http(&settings, app.http_state, app.admin_state).await
}

struct ApplicationContext {
    http_state: HttpState,
    admin_state: AdminState,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<ApplicationContext, AppError> {
    let groups_reader: Arc<dyn GroupsRepo> = repositories.clone();
    let groups_writer: Arc<dyn GroupsWriteRepo> = repositories.clone();
    let pages_reader: Arc<dyn PagesRepo> = repositories.clone();
    let pages_writer: Arc<dyn PagesWriteRepo> = repositories.clone();
    let templates_repo: Arc<dyn TemplatesRepo> = repositories.clone();

    let cache: Arc<dyn CacheStore<Arc<LoadedGroup>>> =
        Arc::new(MokaStore::<Arc<LoadedGroup>>::new(settings.cache.max_capacity));
    let groups = Arc::new(GroupRepository::new(
        groups_reader.clone(),
        cache,
        GroupCacheConfig::from(&settings.cache),
    ));

    let notifier = ContentNotifier::new();
    notifier.subscribe(groups.clone());

    let content = Arc::new(ContentService::new(
        groups_reader.clone(),
        groups_writer,
        notifier,
    ));
    let assembler = ContextAssembler::new(groups);
    let pages = Arc::new(PageService::new(
        pages_reader,
        pages_writer,
        templates_repo,
        groups_reader,
    ));

    let media = MediaUrls::new(settings.uploads.url_prefix.clone());
    let upload_storage = Arc::new(
        UploadStorage::new(settings.uploads.directory.clone())
            .map_err(|err| AppError::from(InfraError::from(err)))?,
    );
    let templates = Arc::new(
        TemplateEngine::load(
            &settings.templates.directory,
            assembler.clone(),
            media.clone(),
        )
        .map_err(AppError::from)?,
    );

    for view in &settings.views {
        if !templates.has_template(&view.template) {
            return Err(AppError::from(InfraError::configuration(format!(
                "view `{}` renders unknown template `{}`",
                view.path, view.template
            ))));
        }
    }
    warn_unloaded_page_templates(&pages, &templates).await;

    let http_state = HttpState {
        pages: pages.clone(),
        assembler: assembler.clone(),
        templates,
        upload_storage: upload_storage.clone(),
        media: media.clone(),
        db: Some(repositories.clone()),
        views: Arc::new(settings.views.clone()),
    };

    let admin_state = AdminState {
        content,
        pages,
        assembler,
        upload_storage,
        media,
        db: Some(repositories),
    };

    Ok(ApplicationContext {
        http_state,
        admin_state,
    })
}

/// Page templates are registered at runtime, so a missing file only warns.
async fn warn_unloaded_page_templates(pages: &PageService, templates: &TemplateEngine) {
    match pages.list_templates().await {
        Ok(records) => {
            for record in records
                .iter()
                .filter(|record| !templates.has_template(&record.path))
            {
                warn!(
                    target = "pagebits::startup",
                    template = %record.name,
                    path = %record.path,
                    directory = %templates.directory().display(),
                    "page template file is not loaded"
                );
            }
        }
        Err(err) => {
            warn!(
                target = "pagebits::startup",
                error = %err,
                "could not list page templates"
            );
        }
    }
}

async fn serve_http(
    settings: &config::Settings,
    http_state: HttpState,
    admin_state: AdminState,
) -> Result<(), AppError> {
    let public_router = http::build_router(http_state);
    let upload_body_limit = usize::try_from(settings.uploads.max_request_bytes.get())
        .map_err(|_| AppError::from(InfraError::configuration("upload limit out of range")))?;
    let admin_router = http::build_admin_router(admin_state, upload_body_limit);

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pagebits::serve",
        public = %settings.server.public_addr,
        admin = %settings.server.admin_addr,
        views = settings.views.len(),
        "listening"
    );

    let public_server = axum::serve(public_listener, public_router.into_make_service());
    let admin_server = axum::serve(admin_listener, admin_router.into_make_service());

    try_join!(public_server, admin_server)
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
