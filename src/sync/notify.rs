use crate::error::ReorderError;

/// Receives exactly one signal per finished change
pub trait Notifier: Send + Sync {
    /// The change was confirmed; `changed` is the number of rows written
    fn succeeded(&self, changed: usize);

    /// The change was rejected or rolled back
    fn failed(&self, error: &ReorderError);
}

/// Discards every signal
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn succeeded(&self, _changed: usize) {}

    fn failed(&self, _error: &ReorderError) {}
}
