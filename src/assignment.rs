//! The binding of one rider to one request
use chrono::Utc;

use crate::error::DispatchError;
use crate::request::TimeStamp;
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    #[n(0)]
    Assigned,
    #[n(1)]
    InProgress,
    #[n(2)]
    Completed,
    #[n(3)]
    Cancelled,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Assignment {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub rider_id: String,
    #[n(2)]
    pub request_id: Option<String>, // cleared if the request is reassigned
    #[n(3)]
    pub status: AssignmentStatus,
    #[n(4)]
    pub assigned_at: TimeStamp<Utc>,
    #[n(5)]
    pub in_progress_at: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub completed_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub cancelled_at: Option<TimeStamp<Utc>>,
}

impl Assignment {
    pub fn new(rider_id: &str, request_id: Option<&str>) -> Result<Self, DispatchError> {
        let id =
            utils::new_uuid_to_bech32("asg").map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(Self {
            id,
            rider_id: rider_id.to_string(),
            request_id: request_id.map(str::to_string),
            status: AssignmentStatus::Assigned,
            assigned_at: TimeStamp::new(),
            in_progress_at: None,
            completed_at: None,
            cancelled_at: None,
        })
    }

    /// An open assignment blocks the rider from taking another job.
    pub fn is_open(&self) -> bool {
        !matches!(
            self.status,
            AssignmentStatus::Completed | AssignmentStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_encoding() {
        let original = Assignment::new("rider_x", Some("req_y")).unwrap();

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Assignment = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn open_until_completed_or_cancelled() {
        let mut assignment = Assignment::new("rider_x", None).unwrap();
        assert!(assignment.is_open());

        assignment.status = AssignmentStatus::InProgress;
        assert!(assignment.is_open());

        assignment.status = AssignmentStatus::Completed;
        assert!(!assignment.is_open());

        assignment.status = AssignmentStatus::Cancelled;
        assert!(!assignment.is_open());
    }
}
