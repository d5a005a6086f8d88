//! Active-strategy catalog from the control-plane.

pub mod http;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::session::SessionHandle;
use crate::strategy::StrategyRecord;
pub use http::HttpCatalogClient;

/// Source of the strategies to run this cycle, in execution order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StrategyCatalog: Send + Sync {
    /// An empty list is a valid answer, not an error.
    async fn fetch_active_strategies(
        &self,
        session: &SessionHandle,
    ) -> Result<Vec<StrategyRecord>, FetchError>;
}
