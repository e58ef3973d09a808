/// Lifecycle of one graph instance. Transitions are driven by startup and
/// shutdown, never by individual requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Uninitialized,
    Configured,
    Running,
    Draining,
    Stopped,
}

impl PipelineState {
    pub fn can_transition_to(&self, target: PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, target),
            (Uninitialized, Configured)
                | (Configured, Running)
                | (Configured, Stopped)
                | (Running, Draining)
                | (Draining, Stopped)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "Uninitialized",
            Self::Configured => "Configured",
            Self::Running => "Running",
            Self::Draining => "Draining",
            Self::Stopped => "Stopped",
        }
    }

    pub fn accepts_frames(&self) -> bool {
        matches!(self, Self::Running)
    }
}
