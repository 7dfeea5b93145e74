//! Multi-threaded back-end of the skim

use crate::{particle::Event, scheduling::EVENT_BATCH_SIZE, skim::SkimResults};

use std::sync::OnceLock;

/// Process events in multi-threaded mode
///
/// Each batch of events is processed by its own task. Tasks may finish in any
/// order, but their results are merged in input order once all of them are
/// done, so the output tables are the same as in a sequential run.
///
pub fn run_skim_impl(
    events: &[Event],
    process_events: impl Send + Sync + Fn(&[Event]) -> SkimResults,
) -> SkimResults {
    // One result slot per batch of events
    let slots = BatchSlots::new(events.len().div_ceil(EVENT_BATCH_SIZE));

    // This function is a synchronization scope: it will only return
    // once all inner tasks have been executed
    rayon::scope(|scope| {
        for (batch_id, batch) in events.chunks(EVENT_BATCH_SIZE).enumerate() {
            let slots = &slots;
            let process_events = &process_events;
            scope.spawn(move |_| slots.fill(batch_id, process_events(batch)));
        }
    });

    // Every slot is now filled, stitch the tables back together
    slots.merge_in_order()
}

/// Write-once storage for the results of each batch
struct BatchSlots {
    slots: Box<[OnceLock<SkimResults>]>,
}
//
impl BatchSlots {
    /// Set up storage for a certain number of batches
    fn new(num_batches: usize) -> Self {
        assert!(num_batches > 0, "There should be at least one batch");
        Self {
            slots: (0..num_batches).map(|_| OnceLock::new()).collect(),
        }
    }

    /// Record the results of one batch
    fn fill(&self, batch_id: usize, results: SkimResults) {
        let filled = self.slots[batch_id].set(results);
        assert!(filled.is_ok(), "Batch {batch_id} was processed twice");
    }

    /// Merge the results of all batches, in batch order
    fn merge_in_order(self) -> SkimResults {
        let mut batches = self.slots.into_vec().into_iter().enumerate().map(|(id, slot)| {
            slot.into_inner()
                .unwrap_or_else(|| panic!("Batch {id} did not report its results"))
        });

        // Later batches are appended to the first one, rebasing their rows
        let first = batches.next().expect("There should be at least one batch");
        batches.fold(first, |mut merged, next| {
            merged.merge(next);
            merged
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_merge_in_batch_order_whatever_the_fill_order() {
        let slots = BatchSlots::new(3);
        for id in [2, 0, 1] {
            let mut results = SkimResults::default();
            results.stats.processed = 1;
            results.stats.orphaned = id;
            results.tables.collisions.push(Default::default());
            results.tables.collisions[0].mult_ntr = id as i32;
            slots.fill(id, results);
        }
        let merged = slots.merge_in_order();
        assert_eq!(merged.stats.processed, 3);
        let order = merged
            .tables
            .collisions
            .iter()
            .map(|c| c.mult_ntr)
            .collect::<Vec<_>>();
        assert_eq!(order, [0, 1, 2]);
    }
}
