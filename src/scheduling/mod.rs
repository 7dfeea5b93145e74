//! This module takes care of scheduling the skimming work, encapsulating use
//! of multiple threads

#[cfg(not(feature = "multi-threading"))] mod sequential;
#[cfg(feature = "multi-threading")] mod multi_threading;

use crate::{particle::Event, skim::SkimResults};


/// Size of the processed event batches
///
/// Events are grouped in batches of a certain size, which are processed
/// independently and then merged in input order. This way, sequential and
/// parallel runs produce exactly the same output tables.
///
const EVENT_BATCH_SIZE: usize = 10_000;


/// Run the skim in the manner that was configured at build time.
///
/// Takes as parameters the full list of input events, and a kernel that
/// processes a contiguous batch of events into partial results.
///
/// Returns the results of all events, merged in input order
///
pub fn run_skim(
    events: &[Event],
    process_events: impl Send + Sync + Fn(&[Event]) -> SkimResults,
) -> SkimResults {
    if events.is_empty() {
        tracing::warn!("no input event, nothing to do");
        return SkimResults::default();
    }
    tracing::debug!(
        num_events = events.len(),
        batch_size = EVENT_BATCH_SIZE,
        "scheduling event batches"
    );

    // ...in sequential mode
    #[cfg(not(feature = "multi-threading"))]
    { sequential::run_skim_impl(events, process_events) }

    // ...in multi-threaded mode
    #[cfg(feature = "multi-threading")]
    { multi_threading::run_skim_impl(events, process_events) }
}
