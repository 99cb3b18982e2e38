//! Draft persistence lifecycle: debounced autosave, restore and discard

mod autosaver;
mod controller;

pub use autosaver::{AutosaveSettings, AutosaveState, Autosaver};
pub use controller::{DiscardReport, DraftController, RestoredState};

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::photos::PhotoError;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("metadata store error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("photo error: {0}")]
    Photo(#[from] PhotoError),
}

pub type Result<T> = std::result::Result<T, DraftError>;
