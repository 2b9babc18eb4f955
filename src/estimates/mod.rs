pub mod catalog;
pub mod error;
pub mod pools;
pub mod selector;

pub use error::{EstimateError, EstimateOutcome};
pub use pools::{EstimatePools, Tier, TieredPool, HARD_INTENSITY_THRESHOLD};
pub use selector::{EstimateSelector, EASTER_EGG_DURATION};
