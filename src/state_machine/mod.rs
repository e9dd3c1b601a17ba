mod item;
mod stage;

pub use item::{ClassificationStatus, ItemPatch, StageOutcome, WorkItem};
pub use stage::{Stage, StageMachine, Transition};
