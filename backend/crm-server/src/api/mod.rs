pub mod error;
pub mod funnels;
pub mod opportunities;
pub mod stages;
pub mod webhooks;

use serde::Serialize;

/// Response for delete endpoints
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted_id: String,
}
