pub mod catalog;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod error;
pub mod executor;
pub mod scheduler;
pub mod session;
pub mod strategy;

pub use catalog::{HttpCatalogClient, StrategyCatalog};
pub use config::AppConfig;
pub use coordination::{ShutdownSignal, ShutdownTrigger};
pub use error::{AuthError, FetchError, HedgeError, Result, ValidationError};
pub use executor::{
    ExecutionResult, ExecutionStatus, JobExecutor, JobLauncher, JobSpec, ProcessLauncher,
};
pub use scheduler::{CycleOutcome, CyclePhase, CycleScheduler, CycleSummary, SchedulerSettings};
pub use session::{AngelOneClient, SessionHandle, SessionManager, VenueAuthenticator};
pub use strategy::{StrategyId, StrategyRecord, StrategyValidator, ValidatedStrategy};
