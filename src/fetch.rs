//! Bounded-concurrency fetch and merge of usage objects
//!
//! Every ready object becomes one task on a [`JoinSet`]. A task first takes a
//! permit from a shared [`Semaphore`] sized by the concurrency limit, so at
//! most that many admin API calls are in flight. The permit is owned by the
//! task and released however the task ends, including a panic.
//!
//! A failing object never stops the batch: its error is logged and counted in
//! the returned [`BatchReport`].

use ostor_usage_core::aggregate::UsageAggregate;
use ostor_usage_core::error::{Result, UsageError};
use ostor_usage_core::persist::DocumentStore;
use ostor_usage_core::provider::UsageApi;
use ostor_usage_core::raw_cache::RawObjectCache;
use ostor_usage_core::types::{ObjectName, UsageItem};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// State owned by a single collection run
///
/// Built fresh for every run and dropped when the run ends, so nothing
/// aggregated in one run leaks into the next.
#[derive(Debug, Default)]
pub struct RunContext {
    /// Counters accumulated from every fetched object
    pub aggregate: UsageAggregate,
    /// Raw documents waiting to be written as chunks
    pub raw_cache: RawObjectCache,
}

impl RunContext {
    /// Create an empty run context
    pub fn new() -> Self {
        Self::default()
    }
}

/// Outcome counts of one batch of per-object tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Objects dispatched
    pub attempted: usize,
    /// Objects whose unit of work finished without error
    pub succeeded: usize,
    /// Objects whose unit of work failed or panicked
    pub failed: usize,
    /// Names of the objects that failed with an error
    pub failed_objects: Vec<ObjectName>,
}

/// Runs fetch+merge (and delete) batches against the admin API
pub struct FetchCoordinator {
    api: Arc<dyn UsageApi>,
    store: Arc<DocumentStore>,
    concurrency: usize,
    save_chunks: bool,
}

impl FetchCoordinator {
    /// Create a coordinator allowing `concurrency` simultaneous calls
    pub fn new(api: Arc<dyn UsageApi>, store: Arc<DocumentStore>, concurrency: usize) -> Self {
        Self {
            api,
            store,
            concurrency: concurrency.max(1),
            save_chunks: false,
        }
    }

    /// Persist every fetched document as a chunk
    pub fn with_save_chunks(mut self, save_chunks: bool) -> Self {
        self.save_chunks = save_chunks;
        self
    }

    /// Concurrency limit in effect
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch every object in `ready` and merge its usage into `ctx.aggregate`
    pub async fn run(&self, ready: &[ObjectName], ctx: &Arc<RunContext>) -> BatchReport {
        let report = run_bounded("fetch", ready, self.concurrency, |object| {
            let api = Arc::clone(&self.api);
            let store = Arc::clone(&self.store);
            let ctx = Arc::clone(ctx);
            let save_chunks = self.save_chunks;
            async move {
                process_object(api.as_ref(), &store, &ctx, &object, save_chunks)
                    .await
                    .map(|_| ())
            }
        })
        .await;

        info!(
            "Fetched {} of {} usage objects ({} failed), {} keys aggregated",
            report.succeeded,
            report.attempted,
            report.failed,
            ctx.aggregate.len()
        );
        report
    }

    /// Delete every object in `objects` from the remote store
    pub async fn delete_all(&self, objects: &[ObjectName]) -> BatchReport {
        let report = run_bounded("delete", objects, self.concurrency, |object| {
            let api = Arc::clone(&self.api);
            async move {
                api.delete_usage_object(&object).await?;
                info!("Deleted usage object {}", object);
                Ok(())
            }
        })
        .await;

        info!(
            "Deleted {} of {} usage objects ({} failed)",
            report.succeeded, report.attempted, report.failed
        );
        report
    }
}

/// Fetch one object, optionally write its chunk, then merge its items
///
/// The chunk is written before extraction so a document that can't be
/// interpreted still lands on disk. Returns the number of items merged.
async fn process_object(
    api: &dyn UsageApi,
    store: &DocumentStore,
    ctx: &RunContext,
    object: &ObjectName,
    save_chunks: bool,
) -> Result<usize> {
    debug!("Started collect {}", object);
    let document = api.fetch_usage_object(object).await?;
    debug!("Usage - got {}", object);

    if save_chunks {
        ctx.raw_cache.insert(object.clone(), document.clone());
        if let Err(e) = ctx.raw_cache.persist_chunk(object, store).await {
            warn!("Failed to save chunk for {}: {}", object, e);
        }
    }

    let items = UsageItem::extract_all(object, &document)?;
    for item in &items {
        ctx.aggregate.add(item);
        debug!(
            "Aggregated stats: object={}, bucket={}, user_id={}",
            object, item.bucket, item.user_id
        );
    }

    Ok(items.len())
}

/// Run `unit` for every object with at most `concurrency` units at a time
async fn run_bounded<F, Fut>(
    label: &'static str,
    objects: &[ObjectName],
    concurrency: usize,
    unit: F,
) -> BatchReport
where
    F: Fn(ObjectName) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut in_flight = JoinSet::new();

    for object in objects {
        let permits = Arc::clone(&permits);
        let work = unit(object.clone());
        let object = object.clone();
        in_flight.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return (object, Err(UsageError::PoolClosed(e.to_string()))),
            };
            (object, work.await)
        });
    }

    let mut report = BatchReport {
        attempted: objects.len(),
        ..BatchReport::default()
    };

    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.succeeded += 1,
            Ok((object, Err(e))) => {
                warn!("{} failed for {}: {}", label, object, e);
                report.failed += 1;
                report.failed_objects.push(object);
            }
            Err(e) => {
                error!("{} task did not complete: {}", label, e);
                report.failed += 1;
            }
        }
    }

    report
}
