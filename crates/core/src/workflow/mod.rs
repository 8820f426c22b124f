pub mod engine;
pub mod states;

pub use engine::{
    apply_action, apply_outcome, complete, is_authorized, schedule, ApprovalEngine, WorkflowError,
    DEFAULT_DENIAL_REASON,
};
pub use states::{Actor, ApprovalAction, NotifyTarget, TransitionOutcome};
