pub mod money;
pub mod period;
pub mod transaction;

use thiserror::Error;

pub use money::Money;
pub use period::DateRange;
pub use transaction::{Polarity, Side, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown transaction type: '{0}'")]
    UnknownPolarity(String),
    #[error("Unknown source: '{0}'")]
    UnknownSide(String),
}
