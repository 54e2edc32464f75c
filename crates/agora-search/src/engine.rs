//! The explore engine: one generic search driven by the entity schemas.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use agora_core::logging;
use agora_core::{
    schema_for, Caller, EntityKind, Error, ExploreAllResult, ExploreConfig, ExploreItem,
    ExploreResult,
    ExploreStore, FacetCatalog, FilterRequest, LabelCatalog, PageSpec, Predicate,
    RawFilterRequest, Result,
};
use agora_db::Database;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, Span};

use crate::filter_vector::compute_filter_vectors;
use crate::hydrate::{hydrate_item, in_page_order};
use crate::images::ImageUrlBuilder;
use crate::query::ExploreQuery;
use crate::text_filter::text_predicate;

/// Source of the current instant; replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Faceted search over every entity kind.
pub struct ExploreEngine {
    store: Arc<dyn ExploreStore>,
    labels: Arc<dyn LabelCatalog>,
    catalog: RwLock<Arc<FacetCatalog>>,
    config: ExploreConfig,
    images: ImageUrlBuilder,
    clock: Clock,
}

impl ExploreEngine {
    /// Create an engine and load the facet catalog from the store.
    pub async fn new(
        store: Arc<dyn ExploreStore>,
        labels: Arc<dyn LabelCatalog>,
        config: ExploreConfig,
    ) -> Result<Self> {
        let catalog = FacetCatalog::new(store.facet_values().await?);
        info!(
            subsystem = "search",
            component = "catalog",
            values = catalog.len(),
            "Facet catalog loaded"
        );
        Self::with_catalog(store, labels, config, catalog)
    }

    /// Create an engine over a PostgreSQL database.
    pub async fn with_database(
        db: &Database,
        labels: Arc<dyn LabelCatalog>,
        config: ExploreConfig,
    ) -> Result<Self> {
        Self::new(Arc::new(db.explore.clone()), labels, config).await
    }

    /// Create an engine with a preloaded catalog.
    pub fn with_catalog(
        store: Arc<dyn ExploreStore>,
        labels: Arc<dyn LabelCatalog>,
        config: ExploreConfig,
        catalog: FacetCatalog,
    ) -> Result<Self> {
        let images = ImageUrlBuilder::new(&config.images)?;
        Ok(Self {
            store,
            labels,
            catalog: RwLock::new(Arc::new(catalog)),
            config,
            images,
            clock: Arc::new(Utc::now),
        })
    }

    /// Replace the clock time windows are anchored to.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ExploreConfig {
        &self.config
    }

    /// Current catalog snapshot.
    pub async fn catalog(&self) -> Arc<FacetCatalog> {
        self.catalog.read().await.clone()
    }

    /// Reload the facet catalog from the store. Returns the number of values.
    #[instrument(skip(self), fields(subsystem = "search", component = "catalog", op = "reload"))]
    pub async fn reload_catalog(&self) -> Result<usize> {
        let catalog = FacetCatalog::new(self.store.facet_values().await?);
        let count = catalog.len();
        *self.catalog.write().await = Arc::new(catalog);
        info!(values = count, "Facet catalog reloaded");
        Ok(count)
    }

    /// Kinds the engine serves under the current feature flags.
    pub fn enabled_kinds(&self) -> Vec<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .filter(|k| *k != EntityKind::Fundings || self.config.flags.fundings)
            .collect()
    }

    /// Search one entity kind.
    pub async fn explore(
        &self,
        kind: EntityKind,
        raw: RawFilterRequest,
        caller: Caller,
        cancel: &CancellationToken,
    ) -> Result<ExploreResult> {
        if kind == EntityKind::Fundings && !self.config.flags.fundings {
            return Err(Error::NotFound("Fundings are disabled".to_string()));
        }
        let catalog = self.catalog().await;
        cancellable(cancel, self.search(kind, raw, caller, &catalog)).await
    }

    /// Search every enabled kind concurrently.
    ///
    /// `requests` holds each kind's own filter request; kinds without an entry
    /// are searched unfiltered. Any failing search fails the whole result.
    #[instrument(
        skip_all,
        fields(subsystem = "search", component = "explore", op = "explore_all", duration_ms = tracing::field::Empty)
    )]
    pub async fn explore_all(
        &self,
        mut requests: BTreeMap<EntityKind, RawFilterRequest>,
        caller: Caller,
        cancel: &CancellationToken,
    ) -> Result<ExploreAllResult> {
        let start = Instant::now();
        let catalog = self.catalog().await;
        let mut take = |kind: EntityKind| requests.remove(&kind).unwrap_or_default();
        let profiles = take(EntityKind::Profiles);
        let organizations = take(EntityKind::Organizations);
        let events = take(EntityKind::Events);
        let projects = take(EntityKind::Projects);
        let fundings = take(EntityKind::Fundings);

        let (profiles, organizations, events, projects, fundings) = cancellable(cancel, async {
            tokio::try_join!(
                self.search(EntityKind::Profiles, profiles, caller, &catalog),
                self.search(EntityKind::Organizations, organizations, caller, &catalog),
                self.search(EntityKind::Events, events, caller, &catalog),
                self.search(EntityKind::Projects, projects, caller, &catalog),
                async {
                    if self.config.flags.fundings {
                        self.search(EntityKind::Fundings, fundings, caller, &catalog)
                            .await
                            .map(Some)
                    } else {
                        Ok(None)
                    }
                },
            )
        })
        .await?;

        let mut results = BTreeMap::new();
        for result in [profiles, organizations, events, projects]
            .into_iter()
            .chain(fundings)
        {
            results.insert(result.kind, result);
        }

        Span::current().record(logging::DURATION_MS, start.elapsed().as_millis() as u64);
        Ok(ExploreAllResult { results })
    }

    #[instrument(
        skip(self, raw, caller, catalog),
        fields(
            subsystem = "search",
            component = "explore",
            op = "explore",
            entity_kind = %kind,
            authenticated = caller.is_authenticated(),
            token_count = tracing::field::Empty,
            total_count = tracing::field::Empty,
            result_count = tracing::field::Empty,
            short_circuit = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    )]
    async fn search(
        &self,
        kind: EntityKind,
        raw: RawFilterRequest,
        caller: Caller,
        catalog: &FacetCatalog,
    ) -> Result<ExploreResult> {
        let start = Instant::now();
        let span = Span::current();
        let schema = schema_for(kind);

        let request = FilterRequest::validate(raw, schema, catalog, &self.config)?;
        span.record(logging::TOKEN_COUNT, request.search.len() as u64);

        let page = PageSpec::resolve(
            schema,
            request.sort,
            request.page,
            self.config.page_size,
            request.period,
        );
        debug!(sort_by = %page.sort_by(), take = page.take, "Pagination resolved");

        let labels = self
            .config
            .flags
            .label_lookup
            .then_some(self.labels.as_ref());
        let query = ExploreQuery {
            schema,
            request: &request,
            caller,
            now: (self.clock)(),
            time_zone: self.config.time_zone,
            text: text_predicate(schema, &request.search, &request.language, &caller, labels),
        };
        let predicate = query.predicate();
        span.record(logging::SHORT_CIRCUIT, predicate.is_false());

        let vectors = async {
            if self.config.flags.filter_vectors {
                compute_filter_vectors(self.store.as_ref(), catalog, self.labels.as_ref(), &query)
                    .await
            } else {
                Ok(BTreeMap::new())
            }
        };

        let outcome = if predicate.is_false() {
            vectors.await.map(|v| (0, Vec::new(), v))
        } else {
            tokio::try_join!(
                self.store.count(schema, &predicate),
                self.fetch_items(kind, &predicate, &page, caller),
                vectors,
            )
        };

        let (total_count, items, filter_vectors) = outcome.inspect_err(|e| {
            error!(
                entity_kind = %kind,
                predicate_shape = %predicate.shape(),
                error = %e,
                "Explore search failed"
            );
        })?;

        span.record(logging::TOTAL_COUNT, total_count);
        span.record(logging::RESULT_COUNT, items.len() as u64);
        span.record(logging::DURATION_MS, start.elapsed().as_millis() as u64);

        Ok(ExploreResult {
            kind,
            items,
            total_count,
            filter_vectors,
            page: page.page,
            take: page.take,
            sort_by: page.sort_by(),
        })
    }

    async fn fetch_items(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        page: &PageSpec,
        caller: Caller,
    ) -> Result<Vec<ExploreItem>> {
        let schema = schema_for(kind);
        let ids = self
            .store
            .fetch_page(schema, predicate, &page.order, page.take)
            .await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.store.hydrate(schema, &ids).await?;
        Ok(in_page_order(&ids, rows)
            .into_iter()
            .map(|row| hydrate_item(schema, row, &caller, &self.images))
            .collect())
    }
}

/// Run `fut` unless `cancel` fires first; outstanding sub-queries are
/// dropped with the future.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Explore request cancelled");
            Err(Error::Cancelled("request cancelled".to_string()))
        }
        result = fut => result,
    }
}
