//! Runs scraped items through the registered pipelines.
//!
//! Items arrive over a kanal channel. Each item gets its own task and visits
//! the pipelines in registration order; at most `max_concurrent_pipelines`
//! items are in the pipelines at once.

use crate::pipeline::Pipeline;
use crate::spider::ScrapedItem;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use kanal::AsyncReceiver;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, trace, warn};

pub(crate) fn spawn_item_processor_task<I>(
    state: Arc<CrawlerState>,
    item_rx: AsyncReceiver<I>,
    pipelines: Arc<Vec<Box<dyn Pipeline<I>>>>,
    max_concurrent_pipelines: usize,
    stats: Arc<StatCollector>,
) -> JoinHandle<()>
where
    I: ScrapedItem,
{
    let limit = max_concurrent_pipelines.max(1);
    trace!("Starting item processor with {} pipeline slots", limit);

    tokio::spawn(async move {
        let slots = Arc::new(Semaphore::new(limit));
        let mut running = JoinSet::new();

        while let Ok(item) = item_rx.recv().await {
            let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
                warn!("Pipeline slots closed, discarding remaining items");
                state.processing_items.fetch_sub(1, Ordering::SeqCst);
                break;
            };

            let state = Arc::clone(&state);
            let pipelines = Arc::clone(&pipelines);
            let stats = Arc::clone(&stats);
            running.spawn(async move {
                if run_pipelines(item, &pipelines, &stats).await {
                    stats.increment_items_processed();
                }
                state.processing_items.fetch_sub(1, Ordering::SeqCst);
                drop(slot);
            });
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                error!("Item pipeline task panicked: {:?}", e);
            }
        }
        trace!("Item processor finished");
    })
}

/// Passes one item through every pipeline. Returns whether it came out the end.
async fn run_pipelines<I: ScrapedItem>(
    item: I,
    pipelines: &[Box<dyn Pipeline<I>>],
    stats: &StatCollector,
) -> bool {
    let mut item = item;
    for pipeline in pipelines {
        item = match pipeline.process_item(item).await {
            Ok(Some(next)) => next,
            Ok(None) => {
                debug!("Pipeline '{}' dropped item", pipeline.name());
                stats.increment_items_dropped_by_pipeline();
                return false;
            }
            Err(e) => {
                error!("Pipeline '{}' failed: {}", pipeline.name(), e);
                stats.increment_items_dropped_by_pipeline();
                return false;
            }
        };
    }
    true
}
