use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;

use crate::{
    api,
    classification::model::FitOptions,
    clients::{PostSearch, PostSource, RedditClient, RedditClientConfig, TitleSearch},
    config::Config,
    evidence::EvidencePipeline,
    observability::Telemetry,
    pipeline::{BatchAnalyzer, CachedSearch, Clock, SystemClock},
    training::TrainingController,
};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

/// 外部データソースの差し替え口。
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn PostSearch>,
    pub source: Arc<dyn PostSource>,
    pub titles: Arc<dyn TitleSearch>,
}

pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    batch: BatchAnalyzer,
    evidence: EvidencePipeline,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn batch(&self) -> &BatchAnalyzer {
        &self.registry.batch
    }

    pub(crate) fn evidence(&self) -> &EvidencePipeline {
        &self.registry.evidence
    }
}

impl ComponentRegistry {
    /// 構成情報から Reddit クライアントを作り、共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化や HTTP クライアント構築が失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let telemetry = Telemetry::new()?;
        let reddit = Arc::new(
            RedditClient::new(RedditClientConfig {
                base_url: config.reddit_base_url().to_string(),
                user_agent: config.user_agent().to_string(),
                connect_timeout: config.http_connect_timeout(),
                total_timeout: config.http_total_timeout(),
            })
            .context("failed to build reddit client")?,
        );
        let collaborators = Collaborators {
            search: reddit.clone(),
            source: reddit.clone(),
            titles: reddit,
        };
        Ok(Self::assemble(
            config,
            telemetry,
            collaborators,
            Arc::new(SystemClock),
        ))
    }

    /// 任意の外部データソースとクロックで組み立てる。サブスクライバは設定しない。
    ///
    /// # Errors
    /// メトリクス登録に失敗した場合はエラーを返す。
    pub fn with_collaborators(
        config: Config,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let telemetry = Telemetry::without_tracing()?;
        Ok(Self::assemble(config, telemetry, collaborators, clock))
    }

    fn assemble(
        config: Config,
        telemetry: Telemetry,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = Arc::new(config);
        let metrics = telemetry.metrics_arc();
        let search: Arc<dyn PostSearch> = Arc::new(CachedSearch::new(
            collaborators.search,
            config.cache_ttl(),
            Arc::clone(&clock),
            Arc::clone(&metrics),
        ));
        let options = FitOptions {
            max_iter: config.max_iter(),
            ..FitOptions::default()
        };
        let trainer = TrainingController::new(
            Arc::clone(&search),
            config.bootstrap_per_topic(),
            config.training_mode(),
            options,
            Arc::clone(&metrics),
        );
        let batch = BatchAnalyzer::new(
            search,
            trainer,
            config.training_mode(),
            config.query_max_results(),
            config.cache_ttl(),
            clock,
            Arc::clone(&metrics),
        );
        let evidence = EvidencePipeline::new(collaborators.source, collaborators.titles, metrics);

        Self {
            config,
            telemetry,
            batch,
            evidence,
        }
    }

    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }
}

pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}
