/// Classification of an engine-reported workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Failure,
    /// Covers both `Aborted` and the transitional `Aborting`.
    Aborted,
    Pending,
}

pub const SUCCEEDED: &str = "Succeeded";
pub const FAILED: &str = "Failed";
pub const ABORTED: &str = "Aborted";
pub const ABORTING: &str = "Aborting";

/// Map a status string to its class. Exact, case-sensitive match; anything
/// unrecognised is `Pending`.
pub fn classify(status: &str) -> StatusClass {
    match status {
        SUCCEEDED => StatusClass::Success,
        FAILED => StatusClass::Failure,
        ABORTED | ABORTING => StatusClass::Aborted,
        _ => StatusClass::Pending,
    }
}

/// Whether a status ends polling. `Aborting` is in the aborted class but is
/// not final: the engine still owes a fully terminal status.
pub fn is_final(status: &str) -> bool {
    matches!(status, SUCCEEDED | FAILED | ABORTED)
}
