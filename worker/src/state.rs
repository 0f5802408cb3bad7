use std::fmt::{self, Display};

/// The lifecycle of a worker's session with the master.
///
/// `Idle -> ModelReceived -> Optimizing -> Released -> Closed`, where `Optimizing` is
/// re-entered on every `run:optimize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    ModelReceived,
    Optimizing,
    Released,
    Closed,
}

impl WorkerState {
    /// Whether a model is bound and the worker accepts `run:optimize` and `set:release`.
    pub fn has_model(self) -> bool {
        matches!(self, WorkerState::ModelReceived | WorkerState::Optimizing)
    }

    /// Whether a `set:model` is accepted, a bound model may be replaced by a new one.
    pub fn accepts_model(self) -> bool {
        self == WorkerState::Idle || self.has_model()
    }
}

impl Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Idle => "idle",
            WorkerState::ModelReceived => "model-received",
            WorkerState::Optimizing => "optimizing",
            WorkerState::Released => "released",
            WorkerState::Closed => "closed",
        };

        f.write_str(name)
    }
}
