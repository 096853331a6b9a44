//! Delivery / booking requests and their lifecycle state machine
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

use crate::error::DispatchError;
use crate::money::Amount;
use crate::pricing::{self, PricingTable};
use crate::utils;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn new_with(year: i32, month: u32, day: u32, hour: u32, min: u32, sec: u32) -> Self {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .unwrap()
            .into()
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Package delivery and rider booking share one shape; the kind only matters
/// to the collaborators listing them.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    #[n(0)]
    Delivery,
    #[n(1)]
    Booking,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Accepted,
    #[n(2)]
    InProgress,
    #[n(3)]
    Completed,
    #[n(4)]
    Cancelled,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Cancel is only reachable before the job is underway.
    pub fn can_cancel(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Update and soft delete are only permitted on requests that were never
    /// picked up, or were cancelled.
    pub fn allows_edit(self) -> bool {
        matches!(self, Self::Pending | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Request {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub kind: RequestKind,
    #[n(2)]
    pub client: String,
    #[n(3)]
    pub pickup_address: String,
    #[n(4)]
    pub pickup_lat: f64,
    #[n(5)]
    pub pickup_lng: f64,
    #[n(6)]
    pub dropoff_address: String,
    #[n(7)]
    pub dropoff_lat: f64,
    #[n(8)]
    pub dropoff_lng: f64,
    #[n(9)]
    pub distance_km: String, // as submitted by the client
    #[n(10)]
    pub price: Amount,
    #[n(11)]
    pub package_name: Option<String>,
    #[n(12)]
    pub package_description: Option<String>,
    #[n(13)]
    pub recipient_name: Option<String>,
    #[n(14)]
    pub recipient_phone: Option<String>,
    #[n(15)]
    pub status: RequestStatus,
    #[n(16)]
    pub deleted: bool,
    #[n(17)]
    pub deleted_by: Option<String>,
    #[n(18)]
    pub created_at: TimeStamp<Utc>,
    #[n(19)]
    pub updated_at: TimeStamp<Utc>,
}

// Also used for updates: the draft is re-finalised and the lifecycle fields of
// the stored request are carried over.
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    kind: Option<RequestKind>,
    client: Option<String>,
    pickup_address: Option<String>,
    pickup_lat: f64,
    pickup_lng: f64,
    dropoff_address: Option<String>,
    dropoff_lat: f64,
    dropoff_lng: f64,
    distance_km: Option<String>,
    package_name: Option<String>,
    package_description: Option<String>,
    recipient_name: Option<String>,
    recipient_phone: Option<String>,
}

impl RequestDraft {
    /// Construct a new draft, the basis for a request
    pub fn new() -> Self {
        Self::default()
    }
    pub fn kind(mut self, kind: RequestKind) -> Self {
        self.kind = Some(kind);
        self
    }
    pub fn client(mut self, client: &str) -> Self {
        self.client = Some(client.to_string());
        self
    }
    pub fn pickup(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.pickup_address = Some(address.to_string());
        self.pickup_lat = lat;
        self.pickup_lng = lng;
        self
    }
    pub fn dropoff(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.dropoff_address = Some(address.to_string());
        self.dropoff_lat = lat;
        self.dropoff_lng = lng;
        self
    }
    pub fn distance_km(mut self, raw: &str) -> Self {
        self.distance_km = Some(raw.to_string());
        self
    }
    pub fn package(mut self, name: &str, description: &str) -> Self {
        self.package_name = Some(name.to_string());
        self.package_description = Some(description.to_string());
        self
    }
    pub fn recipient(mut self, name: &str, phone: &str) -> Self {
        self.recipient_name = Some(name.to_string());
        self.recipient_phone = Some(phone.to_string());
        self
    }

    /// Validate the draft and turn it into a Pending request. A distance that
    /// does not parse is not an error: the request is accepted with a zero
    /// price and settlement later skips it.
    pub fn finalise(self, pricing: &PricingTable) -> Result<Request, DispatchError> {
        let client = self
            .client
            .ok_or_else(|| DispatchError::Validation("client is not set".into()))?;
        let pickup_address = self
            .pickup_address
            .ok_or_else(|| DispatchError::Validation("pickup address is not set".into()))?;
        let dropoff_address = self
            .dropoff_address
            .ok_or_else(|| DispatchError::Validation("dropoff address is not set".into()))?;

        let distance_km = self.distance_km.unwrap_or_default();
        let price = match pricing::parse_distance(&distance_km) {
            Some(distance) => pricing.quote(distance),
            None => {
                warn!(distance = %distance_km, "unparseable distance, pricing request at zero");
                Amount::ZERO
            }
        };

        let id = utils::new_uuid_to_bech32("req")
            .map_err(|e| DispatchError::Internal(e.to_string()))?;
        let now = TimeStamp::new();

        Ok(Request {
            id,
            kind: self.kind.unwrap_or(RequestKind::Delivery),
            client,
            pickup_address,
            pickup_lat: self.pickup_lat,
            pickup_lng: self.pickup_lng,
            dropoff_address,
            dropoff_lat: self.dropoff_lat,
            dropoff_lng: self.dropoff_lng,
            distance_km,
            price,
            package_name: self.package_name,
            package_description: self.package_description,
            recipient_name: self.recipient_name,
            recipient_phone: self.recipient_phone,
            status: RequestStatus::Pending,
            deleted: false,
            deleted_by: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_encoding() {
        let original = TimeStamp::new();

        let encoding = minicbor::to_vec(original.clone()).unwrap();
        let decode: TimeStamp<Utc> = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn request_encoding() {
        let request = RequestDraft::new()
            .client("user_abc")
            .pickup("12 Pickup Lane", 23.81, 90.41)
            .dropoff("3 Dropoff Road", 23.75, 90.39)
            .distance_km("7.5")
            .finalise(&PricingTable::default())
            .unwrap();

        let encoding = minicbor::to_vec(&request).unwrap();
        let decode: Request = minicbor::decode(&encoding).unwrap();

        assert_eq!(request, decode);
    }

    #[test]
    fn draft_requires_client_and_addresses() {
        let missing_client = RequestDraft::new()
            .pickup("a", 0.0, 0.0)
            .dropoff("b", 0.0, 0.0)
            .finalise(&PricingTable::default());

        assert!(matches!(missing_client, Err(DispatchError::Validation(_))));
    }

    #[test]
    fn bad_distance_prices_at_zero() {
        let request = RequestDraft::new()
            .client("user_abc")
            .pickup("a", 0.0, 0.0)
            .dropoff("b", 0.0, 0.0)
            .distance_km("around the corner")
            .finalise(&PricingTable::default())
            .unwrap();

        assert!(request.price.is_zero());
    }

    #[test]
    fn status_rules() {
        use RequestStatus::*;

        assert!(Pending.can_cancel());
        assert!(Accepted.can_cancel());
        assert!(!InProgress.can_cancel());
        assert!(!Completed.can_cancel());

        assert!(Pending.allows_edit());
        assert!(Cancelled.allows_edit());
        assert!(!Accepted.allows_edit());
        assert!(!Completed.allows_edit());

        assert!(Completed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Pending.is_terminal());
    }
}
