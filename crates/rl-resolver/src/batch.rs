//! Per-call resolution state

use std::collections::BTreeMap;

use rl_core::{CompiledRuleList, Identifier};

use crate::operation::CompileResult;

/// Path an identifier took through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Found in the store
    Hit,
    /// Compiled from its source
    Compiled,
    /// No source, or the compile was cancelled
    Empty,
    Failed,
    TimedOut,
}

/// Result of resolving one identifier.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub identifier: Identifier,
    pub resolution: Resolution,
    pub list: Option<CompiledRuleList>,
}

impl Outcome {
    pub fn hit(identifier: Identifier, list: CompiledRuleList) -> Self {
        Self {
            identifier,
            resolution: Resolution::Hit,
            list: Some(list),
        }
    }

    pub fn from_compile(identifier: Identifier, result: CompileResult) -> Self {
        let (resolution, list) = match result {
            CompileResult::Success(list) => (Resolution::Compiled, Some(list)),
            CompileResult::Failure(_) => (Resolution::Failed, None),
            CompileResult::Empty => (Resolution::Empty, None),
        };
        Self {
            identifier,
            resolution,
            list,
        }
    }

    pub fn empty(identifier: Identifier) -> Self {
        Self::dropped(identifier, Resolution::Empty)
    }

    pub fn failed(identifier: Identifier) -> Self {
        Self::dropped(identifier, Resolution::Failed)
    }

    pub fn timed_out(identifier: Identifier) -> Self {
        Self::dropped(identifier, Resolution::TimedOut)
    }

    fn dropped(identifier: Identifier, resolution: Resolution) -> Self {
        Self {
            identifier,
            resolution,
            list: None,
        }
    }
}

/// Counts of how a batch's identifiers were resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolutionReport {
    pub requested: usize,
    pub hits: usize,
    pub compiled: usize,
    pub empty: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl ResolutionReport {
    /// Identifiers that produced a list.
    pub fn resolved(&self) -> usize {
        self.hits + self.compiled
    }

    fn count(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Hit => self.hits += 1,
            Resolution::Compiled => self.compiled += 1,
            Resolution::Empty => self.empty += 1,
            Resolution::Failed => self.failed += 1,
            Resolution::TimedOut => self.timed_out += 1,
        }
    }
}

/// Requested identifiers (deduplicated), their completion flags, and the
/// lists accumulated so far.
#[derive(Debug)]
pub struct ResolutionBatch {
    completed: BTreeMap<Identifier, bool>,
    remaining: usize,
    lists: Vec<CompiledRuleList>,
    report: ResolutionReport,
}

impl ResolutionBatch {
    pub fn new(identifiers: impl IntoIterator<Item = Identifier>) -> Self {
        let completed: BTreeMap<_, _> = identifiers.into_iter().map(|id| (id, false)).collect();
        let remaining = completed.len();
        Self {
            completed,
            remaining,
            lists: Vec::with_capacity(remaining),
            report: ResolutionReport {
                requested: remaining,
                ..ResolutionReport::default()
            },
        }
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.completed.keys()
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }

    /// Fold one outcome in. Outcomes for unknown or already completed
    /// identifiers are ignored. Returns true once every identifier is complete.
    pub fn record(&mut self, outcome: Outcome) -> bool {
        match self.completed.get_mut(&outcome.identifier) {
            Some(done) if !*done => *done = true,
            Some(_) => {
                log::warn!("ignoring second outcome for {}", outcome.identifier);
                return self.is_complete();
            }
            None => {
                log::warn!("ignoring outcome for unrequested {}", outcome.identifier);
                return self.is_complete();
            }
        }

        self.remaining -= 1;
        self.report.count(outcome.resolution);
        if let Some(list) = outcome.list {
            self.lists.push(list);
        }
        self.is_complete()
    }

    /// Mark every identifier still pending as failed.
    pub fn fail_pending(&mut self) {
        let pending: Vec<Identifier> = self
            .completed
            .iter()
            .filter(|(_, done)| !**done)
            .map(|(id, _)| id.clone())
            .collect();
        for identifier in pending {
            self.record(Outcome::failed(identifier));
        }
    }

    pub fn report(&self) -> ResolutionReport {
        self.report
    }

    pub fn finish(self) -> (Vec<CompiledRuleList>, ResolutionReport) {
        (self.lists, self.report)
    }
}
