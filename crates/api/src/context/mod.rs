//! Application context - dependency injection container

use std::sync::Arc;

use hearth_common::SecureString;
use hearth_core::{
    AccessTokenProvider, CredentialVault, FeedProviders, OrchestratorSettings, SourceRegistry,
    SyncOrchestrator, SystemClock,
};
use hearth_domain::{Config, HearthError, Result};
use hearth_infra::{
    DbManager, FeedSchedulerConfig, FeedSyncScheduler, GoogleCalendarProvider, HttpClient,
    IcsFeedProvider, KeyManager, SqliteEventRepository, SqliteSourceRepository,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub orchestrator: Arc<SyncOrchestrator>,
    scheduler: Mutex<Option<FeedSyncScheduler>>,
    scheduler_secret: Option<SecureString>,
}

impl AppContext {
    /// Build the context with the ICS provider only.
    pub async fn new(config: Config) -> Result<Self> {
        Self::with_token_provider(config, None).await
    }

    /// Build the context; Google Calendar sources are served only when a
    /// token provider is supplied.
    ///
    /// Fails fast when the feed encryption key is missing or malformed. A
    /// missing scheduler secret only disables the batch sync entry point.
    pub async fn with_token_provider(
        config: Config,
        tokens: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Result<Self> {
        let vault = KeyManager::load_vault(&config.vault)?;
        let scheduler_secret = match KeyManager::load_scheduler_secret(&config.scheduler) {
            Ok(secret) => Some(secret),
            Err(err) => {
                warn!(error = %err, "batch sync endpoint disabled");
                None
            }
        };

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let http = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(config.sync.fetch_timeout_secs.max(1)))
            .user_agent(config.sync.user_agent.clone())
            .build()?;
        let mut providers = FeedProviders::new().with(Arc::new(IcsFeedProvider::new(http.clone())));
        if let Some(tokens) = tokens {
            providers = providers.with(Arc::new(GoogleCalendarProvider::new(http, tokens)));
        }

        let orchestrator = build_orchestrator(&config, Arc::clone(&db), vault, providers);
        Self::from_parts(config, db, orchestrator, scheduler_secret).await
    }

    /// Assemble a context from prebuilt services and start the scheduler if
    /// configuration enables it.
    pub async fn from_parts(
        config: Config,
        db: Arc<DbManager>,
        orchestrator: Arc<SyncOrchestrator>,
        scheduler_secret: Option<SecureString>,
    ) -> Result<Self> {
        let scheduler = if config.scheduler.enabled {
            let mut scheduler = FeedSyncScheduler::new(
                FeedSchedulerConfig::from(&config.scheduler),
                Arc::clone(&orchestrator),
            );
            scheduler.start().await?;
            Some(scheduler)
        } else {
            info!("feed sweep scheduler disabled by configuration");
            None
        };

        Ok(Self {
            config,
            db,
            orchestrator,
            scheduler: Mutex::new(scheduler),
            scheduler_secret,
        })
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        self.orchestrator.registry()
    }

    /// Shared secret authenticating batch sync triggers.
    pub fn scheduler_secret(&self) -> Result<&SecureString> {
        self.scheduler_secret.as_ref().ok_or_else(|| {
            HearthError::Configuration(format!(
                "scheduler secret not set: export {}",
                self.config.scheduler.secret_env_var
            ))
        })
    }

    /// Whether the background sweep scheduler is currently running.
    pub async fn scheduler_running(&self) -> bool {
        self.scheduler.lock().await.as_ref().is_some_and(FeedSyncScheduler::is_running)
    }

    /// Stop background work. Safe to call more than once.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop().await?;
        }
        info!("application context shut down");
        Ok(())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("db", &self.db)
            .field("scheduler_secret", &self.scheduler_secret.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

fn build_orchestrator(
    config: &Config,
    db: Arc<DbManager>,
    vault: Arc<CredentialVault>,
    providers: FeedProviders,
) -> Arc<SyncOrchestrator> {
    let clock = Arc::new(SystemClock);
    let sources = Arc::new(SqliteSourceRepository::new(Arc::clone(&db)));
    let events = Arc::new(SqliteEventRepository::new(db));

    let registry =
        Arc::new(SourceRegistry::new(sources, Arc::clone(&vault), clock.clone(), &config.sync));
    Arc::new(SyncOrchestrator::new(
        registry,
        events,
        providers,
        vault,
        clock,
        OrchestratorSettings::from(&config.sync),
    ))
}
