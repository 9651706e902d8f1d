//! Submission gate.
//!
//! Only one submission may be in flight. [`SubmissionGate::acquire`] hands
//! out a guard that holds the gate closed until it is dropped, whether the
//! external request succeeded or failed.

use ac_core::EncodeError;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug)]
pub enum SubmitError {
    /// A previous submission has not finished.
    InFlight,
    /// The diagram could not be encoded.
    Encode(EncodeError),
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::InFlight => write!(f, "a submission is already in progress"),
            SubmitError::Encode(e) => write!(f, "could not prepare submission: {e}"),
        }
    }
}

impl std::error::Error for SubmitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SubmitError::InFlight => None,
            SubmitError::Encode(e) => Some(e),
        }
    }
}

impl From<EncodeError> for SubmitError {
    fn from(e: EncodeError) -> Self {
        SubmitError::Encode(e)
    }
}

#[derive(Debug, Default)]
pub struct SubmissionGate {
    busy: Rc<Cell<bool>>,
}

impl SubmissionGate {
    pub fn acquire(&self) -> Result<SubmissionGuard, SubmitError> {
        if self.busy.replace(true) {
            return Err(SubmitError::InFlight);
        }
        Ok(SubmissionGuard {
            busy: Rc::clone(&self.busy),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }
}

/// Holds the gate closed while alive.
#[derive(Debug)]
pub struct SubmissionGuard {
    busy: Rc<Cell<bool>>,
}

impl Drop for SubmissionGuard {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}
