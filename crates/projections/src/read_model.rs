/// Query access to a projection's data.
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of entries currently listed.
    ///
    /// Returns 0 rather than waiting if the model is being written to.
    fn count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }
}
