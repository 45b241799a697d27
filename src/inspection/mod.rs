//! Inspection category: Amun API source and dual-destination index

mod amun;
mod index;

pub use amun::{is_finished, AmunClient, AmunInspectionSource};
pub use index::InspectionIndex;
