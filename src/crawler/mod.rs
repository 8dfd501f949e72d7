//! # Crawler Module
//!
//! Implements the crawl loop that ties the engine together.
//!
//! ## Overview
//!
//! The `Crawler` owns a scheduler, a downloader, a spider and the item
//! pipelines. Each iteration drains the scheduler, pushes the batch through
//! the downloader, lets the spider parse the delivered responses, and
//! schedules any requests it discovers. The loop ends when the scheduler is
//! empty and no fetch is in flight.
//!
//! ## Internal Components
//!
//! - `spawn_item_processor_task`: runs scraped items through the pipelines
//!   concurrently with the crawl loop.

mod core;
mod item_processor;

pub use core::Crawler;
pub(crate) use item_processor::spawn_item_processor_task;
