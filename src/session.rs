use std::time::{Duration, Instant};

/// How the user can currently drive the application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    KeyboardOnly,
    /// A pointer was present and has gone away.
    KeyboardOnlyLocked,
    Full,
    FullLocked,
    /// No seat has reported a pointer yet.
    #[default]
    Undetermined,
}

/// Process-wide flags shared between the display connection and the rest of
/// the application.
#[derive(Debug)]
pub struct Session {
    pub interaction_mode: InteractionMode,
    pub first_poll: bool,
    started: Instant,
}

impl Session {
    pub fn new() -> Session {
        Session {
            interaction_mode: InteractionMode::default(),
            first_poll: true,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for Session {
    fn default() -> Session {
        Session::new()
    }
}
