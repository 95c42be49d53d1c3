//! Daemon shedding ladder.

/// Progressively smaller daemon sets, computed once from the configured daemons.
///
/// Every step has exactly one daemon less than the step before it (or than the
/// configured set, for the first step). The ladder never empties: planning stops
/// as soon as a single daemon remains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShedLadder {
    steps: Vec<Vec<String>>,
}

impl ShedLadder {
    /// Walks `shed_order` and records the remaining daemons after each removal.
    ///
    /// Candidates that are not among the remaining daemons are skipped. Daemons
    /// missing from `shed_order` are never removed.
    pub fn plan<S: AsRef<str>>(daemons: &[String], shed_order: &[S]) -> Self {
        let mut steps = Vec::with_capacity(daemons.len());
        let mut remaining = daemons.to_vec();

        for candidate in shed_order {
            let candidate = candidate.as_ref();
            // Never shed the very last daemon.
            if remaining.len() == 1 {
                break;
            }
            if !remaining.iter().any(|daemon| daemon == candidate) {
                continue;
            }
            remaining.retain(|daemon| daemon != candidate);
            steps.push(remaining.clone());
        }

        Self { steps }
    }

    /// Returns the daemon set of the given step, if the ladder is that long.
    pub fn step(&self, index: usize) -> Option<&[String]> {
        self.steps.get(index).map(Vec::as_slice)
    }

    /// Returns the final, smallest step.
    pub fn last(&self) -> Option<&[String]> {
        self.steps.last().map(Vec::as_slice)
    }

    pub fn steps(&self) -> &[Vec<String>] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
