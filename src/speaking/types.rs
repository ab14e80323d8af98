use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{SpeakingRequestModel, SpeakingRequestStatus};
use crate::room::types::MemberResponse;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakingRequestResponse {
    pub id: String,
    pub room_id: String,
    pub account_id: String,
    pub status: SpeakingRequestStatus,
    pub requested_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl From<SpeakingRequestModel> for SpeakingRequestResponse {
    fn from(request: SpeakingRequestModel) -> Self {
        Self {
            id: request.id,
            room_id: request.room_id,
            account_id: request.account_id,
            status: request.status,
            requested_at: request.requested_at,
            responded_at: request.responded_at,
        }
    }
}

/// Result of approving or rejecting a request: the closed request and the
/// member it was about
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeakingDecisionResponse {
    pub request: SpeakingRequestResponse,
    pub member: MemberResponse,
}
