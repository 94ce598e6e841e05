use std::{error::Error, fmt::Display};

type BoxedError = Box<dyn Error + Send + Sync + 'static>;

///
/// A failure an application reports when its run ends.
///
/// Protocol outcomes like dropped packets or failed transfers are counters,
/// never errors. This is reserved for runs whose results cannot be trusted,
/// e.g. an inconsistent shared environment at the end of the simulation.
///
#[derive(Debug)]
pub struct RuntimeError {
    cause: BoxedError,
}

impl RuntimeError {
    /// Wraps an error or a plain message.
    pub fn new(cause: impl Into<BoxedError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }

    /// The wrapped error, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Error + 'static>(&self) -> Option<&T> {
        self.cause.downcast_ref::<T>()
    }
}

impl Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "simulation failed: {}", self.cause)
    }
}

impl Error for RuntimeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.cause.as_ref())
    }
}
