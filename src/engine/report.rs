use nvm_api::{
    error::{LibraryError, NvmError},
    DimmId,
};

/// Outcome of applying a change to a set of DIMMs, one entry per DIMM in the
/// order they were attempted.
#[derive(Debug, Default)]
pub struct AllocationReport {
    results: Vec<(DimmId, Result<(), LibraryError>)>,
}

impl AllocationReport {
    pub(crate) fn record(&mut self, dimm_id: DimmId, result: Result<(), LibraryError>) {
        self.results.push((dimm_id, result));
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DimmId> {
        self.results
            .iter()
            .filter(|(_, result)| result.is_ok())
            .map(|(dimm_id, _)| dimm_id)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&DimmId, &LibraryError)> {
        self.results
            .iter()
            .filter_map(|(dimm_id, result)| result.as_ref().err().map(|e| (dimm_id, e)))
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Collapses the report into a single result. Any failed DIMM turns the
    /// whole report into a partial commit error.
    pub fn into_result(self) -> Result<(), NvmError> {
        if self.is_success() {
            return Ok(());
        }

        Err(NvmError::new(LibraryError::PartialCommit {
            failed: self.failed().map(|(dimm_id, _)| dimm_id.clone()).collect(),
            succeeded: self.succeeded().count(),
        }))
    }
}
