//! Connection lifecycle hooks
//!
//! Observers registered on the connector run in registration order. A
//! pre-connect hook may rewrite the resolved parameters before the connection
//! is opened; a post-connect hook sees the parameters actually used and the
//! live connection. Returning an error aborts the connect.

use crate::config::ConnectionParams;
use crate::domain::DbError;
use crate::ports::ISqlConnection;

/// Runs before the connection is opened
pub trait IPreConnectHook: Send + Sync {
    fn before_connect(&self, params: &mut ConnectionParams) -> Result<(), DbError>;
}

/// Runs right after the connection is opened
pub trait IPostConnectHook: Send + Sync {
    fn after_connect(
        &self,
        params: &ConnectionParams,
        connection: &dyn ISqlConnection,
    ) -> Result<(), DbError>;
}
