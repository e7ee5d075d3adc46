//! Identifier discovery for the flat city archive
//!
//! Pure, synchronous decision logic. The job workers own the fetching and the
//! persistence; this module only answers "which identifier next" for the three
//! discovery strategies:
//!
//! - gap backfill over `{1..max} \ present`
//! - frontier scanning past the greatest known identifier
//! - bounded ceiling search for first-run bootstrap
//!
//! Keeping these free of IO makes the edge cases (streak resets, bisection
//! invariants, error handling) exhaustively unit-testable.

use std::collections::BTreeSet;

/// Identifiers in `1..=max_confirmed` not yet present, ascending
///
/// `present` includes `empty` sentinel rows, so a backfill pass never
/// re-fetches an identifier that already has an answer.
pub fn gap_candidates(max_confirmed: u32, present: &BTreeSet<u32>) -> Vec<u32> {
    (1..=max_confirmed)
        .filter(|id| !present.contains(id))
        .collect()
}

/// What one probe of an identifier observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The source returned a real match
    Found,
    /// The source answered authoritatively: nothing there
    Empty,
    /// The identifier was already stored; not fetched
    Known,
    /// The fetch failed; the identifier stays unresolved
    Error,
}

/// Scans ascending identifiers past a starting point until a run of
/// consecutive empty answers reaches the configured threshold
///
/// `Known` identifiers reset the streak: stored matches above the start
/// prove the region is live. `Error` advances past the identifier and counts
/// toward the streak so a pass over a dead region terminates even when the
/// source is flaky; errored identifiers are not persisted and the next pass
/// retries them.
#[derive(Debug)]
pub struct FrontierScan {
    next: u32,
    streak: u32,
    threshold: u32,
    found: u32,
    last_checked: u32,
}

impl FrontierScan {
    /// Starts a scan at `start + 1`
    pub fn new(start: u32, threshold: u32) -> Self {
        Self {
            next: start.saturating_add(1),
            streak: 0,
            threshold: threshold.max(1),
            found: 0,
            last_checked: start,
        }
    }

    /// The identifier to probe next, or `None` when the scan is finished
    pub fn next_id(&self) -> Option<u32> {
        if self.streak >= self.threshold {
            return None;
        }
        Some(self.next)
    }

    /// Feeds the result of probing the current identifier
    pub fn observe(&mut self, observation: Observation) {
        self.last_checked = self.next;
        self.next = self.next.saturating_add(1);
        match observation {
            Observation::Found => {
                self.streak = 0;
                self.found += 1;
            }
            Observation::Known => self.streak = 0,
            Observation::Empty | Observation::Error => self.streak += 1,
        }
    }

    /// Matches found so far
    pub fn found(&self) -> u32 {
        self.found
    }

    /// Greatest identifier probed so far
    pub fn last_checked(&self) -> u32 {
        self.last_checked
    }
}

/// The next action a [`CeilingSearch`] wants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// Fetch this identifier and report whether it exists
    Check(u32),
    /// The search converged on the greatest existing identifier
    Done(u32),
}

/// Bounded search for the greatest existing identifier
///
/// Two phases: stepping up from a configured start with a doubling stride
/// until the first empty answer, then bisection of the bracketing interval.
/// The invariant is
/// `lo` has been observed found (or is 0) and `hi` observed empty; every
/// answer must be authoritative, which is why the caller treats a fetch error
/// here as fatal rather than skipping the probe.
#[derive(Debug)]
pub struct CeilingSearch {
    lo: u32,
    hi: Option<u32>,
    step: u32,
    pending: u32,
}

impl CeilingSearch {
    /// Starts probing at `start`, stepping by `step` while answers are found
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            lo: 0,
            hi: None,
            step: step.max(1),
            pending: start.max(1),
        }
    }

    /// The current state of the search
    pub fn probe(&self) -> Probe {
        match self.hi {
            // Bisection finished when the bracket is tight
            Some(hi) if self.lo + 1 >= hi => Probe::Done(self.lo),
            _ => Probe::Check(self.pending),
        }
    }

    /// Reports whether the pending identifier exists
    pub fn observe(&mut self, exists: bool) {
        let probed = self.pending;
        if exists {
            self.lo = probed;
        } else {
            self.hi = Some(match self.hi {
                Some(hi) => hi.min(probed),
                None => probed,
            });
        }

        self.pending = match self.hi {
            // Growth phase: stride doubles after every hit
            None => {
                let next = probed.saturating_add(self.step);
                self.step = self.step.saturating_mul(2);
                next
            }
            Some(hi) => self.lo + (hi - self.lo) / 2,
        };
    }
}
