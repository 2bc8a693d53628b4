//! Leaf nodes.
//!
//! A leaf wraps exactly one task and has no children.

use decision_core::{ActionTask, ExecutionError, ExecutionResult, NodeId, PerceptionTask, Status};

use crate::tree::Ticker;

/// Node delegating to a task.
#[derive(Debug)]
pub enum Leaf {
    /// Reports the status of an action.
    Action(Option<ActionTask>),

    /// Maps a perception check to a terminal status.
    Perception(PerceptionLeaf),
}

impl Leaf {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Leaf::Action(_) => "action",
            Leaf::Perception(_) => "perception",
        }
    }

    pub(crate) fn start(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<()> {
        let missing = || ExecutionError::MissingTask(tree.name(id));
        match self {
            Leaf::Action(task) => task.as_mut().ok_or_else(missing)?.start(tree.ctx()),
            Leaf::Perception(leaf) => {
                for status in [leaf.on_true, leaf.on_false] {
                    if !status.is_finished() {
                        return Err(ExecutionError::InvalidFinishStatus(status));
                    }
                }
                leaf.task.as_mut().ok_or_else(missing)?.start(tree.ctx())
            }
        }
    }

    pub(crate) fn update(&mut self, tree: &mut Ticker<'_>, id: NodeId) -> ExecutionResult<Status> {
        let missing = || ExecutionError::MissingTask(tree.name(id));
        match self {
            Leaf::Action(task) => {
                let status = task.as_mut().ok_or_else(missing)?.update(tree.ctx())?;
                // An action without a status has not finished yet.
                Ok(if status == Status::None {
                    Status::Running
                } else {
                    status
                })
            }
            Leaf::Perception(leaf) => {
                let holds = leaf.task.as_mut().ok_or_else(missing)?.check(tree.ctx())?;
                Ok(if holds { leaf.on_true } else { leaf.on_false })
            }
        }
    }

    pub(crate) fn stop(&mut self, tree: &mut Ticker<'_>, _id: NodeId) -> ExecutionResult<()> {
        match self {
            Leaf::Action(Some(task)) => task.stop(tree.ctx()),
            Leaf::Perception(PerceptionLeaf {
                task: Some(task), ..
            }) => task.stop(tree.ctx()),
            _ => Ok(()),
        }
    }

    pub(crate) fn pause(&mut self, tree: &mut Ticker<'_>) {
        match self {
            Leaf::Action(Some(task)) => task.pause(tree.ctx()),
            Leaf::Perception(PerceptionLeaf {
                task: Some(task), ..
            }) => task.pause(tree.ctx()),
            _ => {}
        }
    }

    pub(crate) fn resume(&mut self, tree: &mut Ticker<'_>) {
        match self {
            Leaf::Action(Some(task)) => task.resume(tree.ctx()),
            Leaf::Perception(PerceptionLeaf {
                task: Some(task), ..
            }) => task.resume(tree.ctx()),
            _ => {}
        }
    }
}

/// Perception leaf with its status mapping.
#[derive(Debug)]
pub struct PerceptionLeaf {
    pub(crate) task: Option<PerceptionTask>,
    on_true: Status,
    on_false: Status,
}

impl PerceptionLeaf {
    pub(crate) fn new(task: Option<PerceptionTask>, on_true: Status, on_false: Status) -> Self {
        Self {
            task,
            on_true,
            on_false,
        }
    }

    pub fn on_true(&self) -> Status {
        self.on_true
    }

    pub fn on_false(&self) -> Status {
        self.on_false
    }
}
