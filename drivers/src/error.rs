/// Sticky error and warning slots shared with background tasks.
///
/// Deferred tasks and poll loops cannot return errors to the caller, they
/// park the first one here instead. Later occurrences are dropped until
/// the slot is taken, so the caller always sees the oldest cause.
#[derive(Debug, Clone)]
pub struct Flag<IntoError, IntoWarning>(
    std::sync::Arc<std::sync::Mutex<(Option<IntoError>, Option<IntoWarning>)>>,
)
where
    IntoError: Clone + Send,
    IntoWarning: Clone + Send;

impl<IntoError, IntoWarning> Flag<IntoError, IntoWarning>
where
    IntoError: Clone + Send,
    IntoWarning: Clone + Send,
{
    pub fn new() -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new((None, None))))
    }

    pub fn park_error<Error>(&self, error: Error)
    where
        Error: Into<IntoError>,
    {
        self.0
            .lock()
            .expect("mutex is not poisoned")
            .0
            .get_or_insert(error.into());
    }

    pub fn park_warning<Warning>(&self, warning: Warning)
    where
        Warning: Into<IntoWarning>,
    {
        self.0
            .lock()
            .expect("mutex is not poisoned")
            .1
            .get_or_insert(warning.into());
    }

    /// Empties the error slot, as a `Result` so callers can `?` it.
    pub fn take_error(&self) -> Result<(), IntoError> {
        match self.0.lock().expect("mutex is not poisoned").0.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn take_warning(&self) -> Option<IntoWarning> {
        self.0.lock().expect("mutex is not poisoned").1.take()
    }
}

impl<IntoError, IntoWarning> Default for Flag<IntoError, IntoWarning>
where
    IntoError: Clone + Send,
    IntoWarning: Clone + Send,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Non-fatal conditions observed by the dispatcher.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Warning {
    TransmitErrorRecovered,
}
