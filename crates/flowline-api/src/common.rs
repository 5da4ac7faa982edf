// Shared API response types

use serde::Serialize;
use utoipa::ToSchema;

/// Standard list envelope
#[derive(Debug, Serialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

/// Latest sequence number for a workspace; new subscribers use this to
/// establish a starting offset without replaying history.
#[derive(Debug, Serialize, ToSchema)]
pub struct LatestSequenceResponse {
    pub latest_sequence: i64,
}
