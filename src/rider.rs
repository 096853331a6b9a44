//! Rider identity and settlement linkage
use chrono::Utc;

use crate::error::DispatchError;
use crate::request::TimeStamp;
use crate::utils;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Rider {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub phone_number: String,
    #[n(3)]
    pub code: String, // unique human-readable code
    #[n(4)]
    pub commissioner: Option<String>,
    #[n(5)]
    pub boss: String,
    #[n(6)]
    pub user: Option<String>, // owning account, credited on settlement
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

impl Rider {
    pub fn new(name: &str, phone_number: &str, boss: &str) -> Result<Self, DispatchError> {
        let id = utils::new_uuid_to_bech32("rider")
            .map_err(|e| DispatchError::Internal(e.to_string()))?;

        Ok(Self {
            id,
            name: name.to_string(),
            phone_number: phone_number.to_string(),
            code: utils::new_short_code(),
            commissioner: None,
            boss: boss.to_string(),
            user: None,
            created_at: TimeStamp::new(),
        })
    }

    pub fn with_commissioner(mut self, commissioner: &str) -> Self {
        self.commissioner = Some(commissioner.to_string());
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user = Some(user.to_string());
        self
    }

    /// The party whose ledger row and wallet receive the rider share. Riders
    /// without a linked account settle against their own id.
    pub fn settlement_party(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rider_encoding() {
        let original = Rider::new("Rahim", "01700000001", "user_boss")
            .unwrap()
            .with_commissioner("user_comm");

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: Rider = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn settlement_party_prefers_linked_user() {
        let rider = Rider::new("Karim", "01700000002", "user_boss").unwrap();
        assert_eq!(rider.settlement_party(), rider.id);

        let linked = rider.clone().with_user("user_karim");
        assert_eq!(linked.settlement_party(), "user_karim");
    }
}
