//! Scripted tasks and providers for engine tests.
//!
//! Enabled by the `testing` feature. Every helper keeps its observable state
//! behind shared handles so a test can hand the task to an engine and still
//! inspect it afterwards.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::ExecutionContext;
use crate::error::ExecutionResult;
use crate::random::RandomProvider;
use crate::status::Status;
use crate::task::{Action, Perception};

/// Shared hook counters.
#[derive(Clone, Debug, Default)]
pub struct Probe {
    counts: Rc<Counts>,
}

#[derive(Debug, Default)]
struct Counts {
    starts: Cell<u32>,
    updates: Cell<u32>,
    stops: Cell<u32>,
    pauses: Cell<u32>,
    resumes: Cell<u32>,
    checks: Cell<u32>,
}

fn bump(cell: &Cell<u32>) {
    cell.set(cell.get() + 1);
}

impl Probe {
    pub fn starts(&self) -> u32 {
        self.counts.starts.get()
    }

    pub fn updates(&self) -> u32 {
        self.counts.updates.get()
    }

    pub fn stops(&self) -> u32 {
        self.counts.stops.get()
    }

    pub fn pauses(&self) -> u32 {
        self.counts.pauses.get()
    }

    pub fn resumes(&self) -> u32 {
        self.counts.resumes.get()
    }

    pub fn checks(&self) -> u32 {
        self.counts.checks.get()
    }
}

/// Action replaying a script of statuses, one per update. The last entry
/// repeats once the script runs out; an empty script keeps running.
/// Starting the action rewinds the script.
#[derive(Debug)]
pub struct ScriptedAction {
    script: Vec<Status>,
    cursor: usize,
    probe: Probe,
}

impl ScriptedAction {
    pub fn new(script: impl IntoIterator<Item = Status>) -> Self {
        Self {
            script: script.into_iter().collect(),
            cursor: 0,
            probe: Probe::default(),
        }
    }

    /// Action that succeeds on its first update.
    pub fn success() -> Self {
        Self::new([Status::Success])
    }

    /// Action that fails on its first update.
    pub fn failure() -> Self {
        Self::new([Status::Failure])
    }

    /// Action that never finishes.
    pub fn running() -> Self {
        Self::new([Status::Running])
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl Action for ScriptedAction {
    fn on_start(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        self.cursor = 0;
        bump(&self.probe.counts.starts);
        Ok(())
    }

    fn on_update(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<Status> {
        bump(&self.probe.counts.updates);
        let status = self
            .script
            .get(self.cursor)
            .or(self.script.last())
            .copied()
            .unwrap_or(Status::Running);
        self.cursor += 1;
        Ok(status)
    }

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        bump(&self.probe.counts.stops);
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {
        bump(&self.probe.counts.pauses);
    }

    fn on_resume(&mut self, _ctx: &ExecutionContext) {
        bump(&self.probe.counts.resumes);
    }
}

/// Perception reading a shared flag. Clones share the flag and the probe.
#[derive(Clone, Debug)]
pub struct FlagPerception {
    value: Rc<Cell<bool>>,
    probe: Probe,
}

impl FlagPerception {
    pub fn new(value: bool) -> Self {
        Self {
            value: Rc::new(Cell::new(value)),
            probe: Probe::default(),
        }
    }

    pub fn set(&self, value: bool) {
        self.value.set(value);
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

impl Perception for FlagPerception {
    fn on_start(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        bump(&self.probe.counts.starts);
        Ok(())
    }

    fn check(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<bool> {
        bump(&self.probe.counts.checks);
        Ok(self.value.get())
    }

    fn on_stop(&mut self, _ctx: &ExecutionContext) -> ExecutionResult<()> {
        bump(&self.probe.counts.stops);
        Ok(())
    }

    fn on_pause(&mut self, _ctx: &ExecutionContext) {
        bump(&self.probe.counts.pauses);
    }

    fn on_resume(&mut self, _ctx: &ExecutionContext) {
        bump(&self.probe.counts.resumes);
    }
}

/// Random provider replaying fixed samples; the last one repeats.
#[derive(Debug, Default)]
pub struct SequenceRandom {
    samples: RefCell<VecDeque<f32>>,
    last: Cell<f32>,
}

impl SequenceRandom {
    pub fn new(samples: impl IntoIterator<Item = f32>) -> Self {
        Self {
            samples: RefCell::new(samples.into_iter().collect()),
            last: Cell::new(0.0),
        }
    }
}

impl RandomProvider for SequenceRandom {
    fn next_f32(&self) -> f32 {
        if let Some(sample) = self.samples.borrow_mut().pop_front() {
            self.last.set(sample);
        }
        self.last.get()
    }
}
