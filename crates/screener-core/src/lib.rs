pub mod error;
pub mod sectors;
pub mod stages;
pub mod table;
pub mod types;
pub mod valuation;

pub use error::*;
pub use types::*;
pub use valuation::{classify, Valuation, OVERVALUED_BUFFER};
