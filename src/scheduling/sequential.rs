//! Sequential back-end of the skim

use crate::{particle::Event, scheduling::EVENT_BATCH_SIZE, skim::SkimResults};

/// Process events in sequential mode
///
/// We use batched logic even in sequential mode, so that the kernel sees the
/// same batches as in multi-threaded runs.
///
pub fn run_skim_impl(
    events: &[Event],
    process_events: impl Send + Sync + Fn(&[Event]) -> SkimResults,
) -> SkimResults {
    let mut batches = events.chunks(EVENT_BATCH_SIZE);

    // Initialize the accumulator with the first batch of events
    let mut accumulator = batches.next().map(&process_events).unwrap_or_default();

    // Integrate the remaining batches, in order
    for batch in batches {
        accumulator.merge(process_events(batch));
    }
    accumulator
}
