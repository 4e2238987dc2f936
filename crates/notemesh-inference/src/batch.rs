//! Batch processing strategies built on the retry executor.
//!
//! Two shapes, chosen by whether the provider API accepts one text or many
//! per call:
//!
//! - [`process_individually`]: one item per call, each wrapped in retry,
//!   with a rate-smoothing delay between fixed-size groups and a failure
//!   callback that can stop the run or skip to the next item.
//! - [`process_in_groups`]: fixed-size groups partitioned up front, each
//!   group one retried call. A failed group is recorded and the run
//!   continues; one poisoned group never aborts the rest.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use notemesh_core::defaults;
use notemesh_core::{CancelFlag, Error, Result};

use crate::retry::{with_retry, RetryOptions};

/// Options shared by both batch strategies.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Items per group.
    pub group_size: usize,
    /// Pause between groups in milliseconds (never after the last group).
    pub delay_between_groups_ms: u64,
    /// Retry policy applied to each call.
    pub retry: RetryOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            group_size: defaults::EMBED_BATCH_SIZE,
            delay_between_groups_ms: defaults::EMBED_BATCH_DELAY_MS,
            retry: RetryOptions::default(),
        }
    }
}

impl BatchOptions {
    /// Set the group size (minimum 1).
    pub fn with_group_size(mut self, size: usize) -> Self {
        self.group_size = size.max(1);
        self
    }

    /// Set the inter-group delay.
    pub fn with_delay_between_groups_ms(mut self, ms: u64) -> Self {
        self.delay_between_groups_ms = ms;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

/// What a failure callback decides for the rest of a per-item run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    /// Skip the failed item, keep going.
    Continue,
    /// Stop the run after recording this failure.
    Stop,
}

/// A single item that failed after exhausting retries.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub index: usize,
    pub error: String,
}

/// Result of a per-item run.
#[derive(Debug, Default)]
pub struct ItemBatchReport<T> {
    pub results: Vec<T>,
    pub failures: Vec<ItemFailure>,
    pub stopped_early: bool,
}

/// Process items one at a time, each individually retried.
///
/// A delay is inserted between fixed-size groups (not after every item) to
/// smooth request rate. The failure callback decides whether a failed item
/// stops the run or is skipped.
pub async fn process_individually<I, T, F, Fut>(
    label: &str,
    items: Vec<I>,
    opts: &BatchOptions,
    op: F,
    mut on_failure: impl FnMut(usize, &Error) -> FailureAction,
) -> ItemBatchReport<T>
where
    I: Clone,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut report = ItemBatchReport {
        results: Vec::new(),
        failures: Vec::new(),
        stopped_early: false,
    };

    for (index, item) in items.into_iter().enumerate() {
        if index > 0 && index % opts.group_size == 0 && opts.delay_between_groups_ms > 0 {
            sleep(Duration::from_millis(opts.delay_between_groups_ms)).await;
        }

        match with_retry(label, &opts.retry, || op(item.clone())).await {
            Ok(value) => report.results.push(value),
            Err(err) => {
                let action = on_failure(index, &err);
                warn!(
                    op = label,
                    index,
                    error = %err,
                    stop = action == FailureAction::Stop,
                    "Item failed after retries"
                );
                report.failures.push(ItemFailure {
                    index,
                    error: err.to_string(),
                });
                if action == FailureAction::Stop {
                    report.stopped_early = true;
                    break;
                }
            }
        }
    }

    report
}

/// A group that failed after exhausting retries.
#[derive(Debug, Clone)]
pub struct GroupFailure {
    pub group_index: usize,
    pub item_count: usize,
    pub error: String,
}

/// Result of a per-group run.
///
/// `processed` counts every item whose group was attempted, success or
/// failure, distinguishing "attempted and failed" from "never attempted"
/// (cancelled before the group started).
#[derive(Debug, Default)]
pub struct GroupBatchReport<T> {
    pub results: Vec<T>,
    pub failures: Vec<GroupFailure>,
    pub processed: usize,
    pub cancelled: bool,
}

/// Process items in fixed-size groups, one retried provider call per group.
///
/// The cancellation flag is checked before each group; an in-flight group
/// always completes. `on_group_done` fires after every attempted group
/// with `(processed_so_far, total)`.
pub async fn process_in_groups<I, T, F, Fut>(
    label: &str,
    items: Vec<I>,
    opts: &BatchOptions,
    cancel: &CancelFlag,
    op: F,
    mut on_group_done: impl FnMut(usize, usize),
) -> GroupBatchReport<T>
where
    I: Clone,
    F: Fn(Vec<I>) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let total = items.len();
    let groups: Vec<Vec<I>> = items
        .chunks(opts.group_size.max(1))
        .map(|c| c.to_vec())
        .collect();
    let group_count = groups.len();

    let mut report = GroupBatchReport {
        results: Vec::new(),
        failures: Vec::new(),
        processed: 0,
        cancelled: false,
    };

    for (group_index, group) in groups.into_iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(op = label, group_index, "Cancelled before group");
            report.cancelled = true;
            break;
        }

        let item_count = group.len();
        match with_retry(label, &opts.retry, || op(group.clone())).await {
            Ok(values) => {
                report.results.extend(values);
            }
            Err(err) => {
                warn!(
                    op = label,
                    batch_index = group_index,
                    item_count,
                    error = %err,
                    "Group failed after retries, continuing with next group"
                );
                report.failures.push(GroupFailure {
                    group_index,
                    item_count,
                    error: err.to_string(),
                });
            }
        }

        // Attempted either way: the group counts as processed.
        report.processed += item_count;
        on_group_done(report.processed, total);

        let is_last = group_index + 1 == group_count;
        if !is_last && opts.delay_between_groups_ms > 0 {
            sleep(Duration::from_millis(opts.delay_between_groups_ms)).await;
        }
    }

    report
}
