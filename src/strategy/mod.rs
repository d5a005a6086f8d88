pub mod record;
pub mod validator;

pub use record::{StrategyId, StrategyRecord, ValidatedStrategy};
pub use validator::StrategyValidator;
