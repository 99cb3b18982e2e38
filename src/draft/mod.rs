//! Draft data model
//!
//! ## Key Components
//!
//! - [`DraftKey`] / [`ItemKey`] / [`PhotoId`] - identifiers passed explicitly to every component
//! - [`DraftDocument`] - what the metadata store persists for one draft
//! - [`PhotoRef`] - durable pointer to a blob-stored photo
//! - [`FormState`] - live form state, including in-memory photo items
//! - [`FormView`] - read access shared by live state and stored documents

mod form;
mod key;
mod model;

pub use form::{FormState, FormView};
pub use key::{DraftKey, GROUP_SEPARATOR, ItemKey, KeyError, PhotoId};
pub use model::{Answer, DraftDocument, Measurement, PhotoRef, Stage};
