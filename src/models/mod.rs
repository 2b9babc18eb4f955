pub mod estimate;
pub mod mode;

pub use estimate::EstimateResult;
pub use mode::Mode;
