//! Item pipeline contract.
//!
//! Items leaving a spider pass through the registered pipelines in order.
//! A pipeline returns `Ok(Some(item))` to hand the item on, `Ok(None)` to
//! drop it, or an error, which also ends the item's journey.

use crate::error::PipelineError;
use crate::spider::ScrapedItem;
use async_trait::async_trait;

#[async_trait]
pub trait Pipeline<I: ScrapedItem>: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn process_item(&self, item: I) -> Result<Option<I>, PipelineError>;

    /// Called once after the crawl finished.
    async fn close(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}
