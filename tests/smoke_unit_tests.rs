//! Smoke Screen Unit tests for the dispatch core components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path.
//!
#![allow(unused_imports)]

use chrono::{Datelike, Timelike, Utc};
use rider_dispatch::{
    error::DispatchError,
    money::{Amount, split_price},
    pricing::{PricingTable, parse_distance},
    request::{RequestDraft, RequestKind, RequestStatus, TimeStamp},
    rider::Rider,
    utils::{new_short_code, new_uuid_to_bech32},
};
use rust_decimal::Decimal;
use std::str::FromStr;

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("req");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("req1"));
        assert!(encoded.len() > 10); // UUID should produce substantial output
    }

    /// Test that the function handles empty strings appropriately
    #[test]
    fn handles_empty_hrp() {
        // Empty string should fail
        let result = new_uuid_to_bech32("");
        assert!(result.is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("req").unwrap();
        let id2 = new_uuid_to_bech32("req").unwrap();
        let id3 = new_uuid_to_bech32("req").unwrap();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    /// Test that different HRPs produce different encoded strings
    #[test]
    fn different_hrps_produce_different_encodings() {
        let request_id = new_uuid_to_bech32("req").unwrap();
        let rider_id = new_uuid_to_bech32("rider").unwrap();

        assert!(request_id.starts_with("req"));
        assert!(rider_id.starts_with("rider"));
        assert_ne!(request_id, rider_id);
    }

    #[test]
    fn short_codes_are_short_and_unique() {
        let code1 = new_short_code();
        let code2 = new_short_code();

        assert_eq!(code1.len(), 8);
        assert!(code1.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(code1, code2);
    }
}

// TIMESTAMP TESTS
#[cfg(test)]
mod timestamp_tests {
    use super::*;

    /// Test that TimeStamp::new() creates a timestamp close to current time
    #[test]
    fn timestamp_new_creates_current_time() {
        let ts = TimeStamp::new();
        let now = Utc::now();

        let diff = (now - ts.to_datetime_utc()).num_seconds().abs();
        assert!(diff < 1); // Should be within 1 second
    }

    /// Test that TimeStamp can be created with specific date/time values
    #[test]
    fn timestamp_new_with_creates_specific_time() {
        let ts = TimeStamp::new_with(2024, 6, 15, 10, 30, 0);
        let dt = ts.to_datetime_utc();

        assert_eq!(dt.year(), 2024);
        assert_eq!(dt.month(), 6);
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.minute(), 30);
    }

    /// Test that TimeStamp CBOR encoding/decoding round-trips correctly
    #[test]
    fn timestamp_cbor_roundtrip() {
        let original = TimeStamp::new();

        let encoded = minicbor::to_vec(&original).unwrap();
        let decoded: TimeStamp<Utc> = minicbor::decode(&encoded).unwrap();

        assert_eq!(original, decoded);
    }
}

// MONEY MODULE TESTS
#[cfg(test)]
mod money_tests {
    use super::*;

    #[test]
    fn amount_parses_and_displays() {
        let amount = Amount::from_str("1234.56").unwrap();
        assert_eq!(amount, Amount::new(1234_56, 2));
        assert_eq!(amount.to_string(), "1234.56");
    }

    #[test]
    fn quantization_is_half_up() {
        assert_eq!(Amount::new(4_505, 3).round2(), Amount::new(4_51, 2)); // 4.505 -> 4.51
        assert_eq!(Amount::new(4_504, 3).round2(), Amount::new(4_50, 2)); // 4.504 -> 4.50
    }

    /// The documented 90/3/7 and 90/0/10 percentages on a round price
    #[test]
    fn split_matches_documented_percentages() {
        let with = split_price(Amount::new(1000, 0), true);
        assert_eq!(
            (with.rider, with.commissioner, with.boss),
            (
                Amount::new(900_00, 2),
                Amount::new(30_00, 2),
                Amount::new(70_00, 2)
            )
        );

        let without = split_price(Amount::new(1000, 0), false);
        assert_eq!(
            (without.rider, without.commissioner, without.boss),
            (Amount::new(900_00, 2), Amount::ZERO, Amount::new(100_00, 2))
        );
    }

    #[test]
    fn zero_and_negative_prices_split_to_nothing() {
        for price in [Amount::ZERO, Amount::new(-500, 2)] {
            let split = split_price(price, true);
            assert_eq!(split.total(), Amount::ZERO);
        }
    }
}

// PRICING MODULE TESTS
#[cfg(test)]
mod pricing_tests {
    use super::*;

    /// The block boundaries called out in the fare rules: 5 km rides at the
    /// base fare, 5.1 km and 10 km both add exactly one block.
    #[test]
    fn block_boundaries() {
        let table = PricingTable::default();
        let base = table.base_fare;
        let one_block = table.base_fare + table.block_fare;

        assert_eq!(table.quote(Decimal::from(5)), base);
        assert_eq!(table.quote(Decimal::from_str("5.1").unwrap()), one_block);
        assert_eq!(table.quote(Decimal::from(10)), one_block);
    }

    #[test]
    fn distance_text_is_recovered_not_fatal() {
        assert!(parse_distance("8.25").is_some());
        assert!(parse_distance("").is_none());
        assert!(parse_distance("eight").is_none());
        assert!(parse_distance("-4").is_none());
    }
}

// REQUEST MODULE TESTS
#[cfg(test)]
mod request_tests {
    use super::*;

    /// Test that the draft builder pattern carries every field through
    #[test]
    fn draft_builder_sets_fields() {
        let request = RequestDraft::new()
            .kind(RequestKind::Booking)
            .client("user_client")
            .pickup("pickup addr", 23.75, 90.39)
            .dropoff("dropoff addr", 23.81, 90.41)
            .distance_km("4")
            .package("parcel", "fragile")
            .recipient("Nadia", "01900000001")
            .finalise(&PricingTable::default())
            .unwrap();

        assert_eq!(request.kind, RequestKind::Booking);
        assert_eq!(request.client, "user_client");
        assert_eq!(request.pickup_address, "pickup addr");
        assert_eq!(request.dropoff_address, "dropoff addr");
        assert_eq!(request.package_name.as_deref(), Some("parcel"));
        assert_eq!(request.recipient_phone.as_deref(), Some("01900000001"));
        assert_eq!(request.status, RequestStatus::Pending);
        assert!(!request.deleted);
    }

    #[test]
    fn price_is_monotonic_in_distance() {
        let table = PricingTable::default();
        let mut last = Amount::ZERO;

        for km in 1..=60 {
            let price = table.quote(Decimal::from(km));
            assert!(price >= last, "price dropped at {km} km");
            last = price;
        }
    }
}

// SERVICE ERROR-PATH TESTS
#[cfg(test)]
mod service_error_tests {
    use super::*;
    use rider_dispatch::service::DispatchService;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn draft(client: &str) -> RequestDraft {
        RequestDraft::new()
            .client(client)
            .pickup("a", 0.0, 0.0)
            .dropoff("b", 0.0, 0.0)
            .distance_km("3")
    }

    #[test]
    fn unknown_ids_surface_as_not_found() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("not_found.db"))?);
        let service = DispatchService::new(db);

        let err = service.assign_rider("req_missing", "rider_missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { kind: "request", .. }));

        let err = service.complete_request("req_missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { kind: "request", .. }));

        let err = service.complete_assignment("asg_missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { kind: "assignment", .. }));

        // a known request with an unknown rider blames the rider
        let request = service.create_request(draft("user_c"))?;
        let err = service.assign_rider(&request.id, "rider_missing").unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { kind: "rider", .. }));

        Ok(())
    }

    #[test]
    fn lifecycle_violations_surface_as_invalid_state() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("invalid_state.db"))?);
        let service = DispatchService::new(db);

        let boss = new_uuid_to_bech32("user")?;
        let rider_a = Rider::new("A", "01700000101", &boss)?;
        let rider_b = Rider::new("B", "01700000102", &boss)?;
        service.register_rider(&rider_a)?;
        service.register_rider(&rider_b)?;

        let request = service.create_request(draft("user_c"))?;

        // completion requires an accepted or in-progress request
        let err = service.complete_request(&request.id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));

        // starting is only valid once accepted
        let err = service.set_in_progress(&request.id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));

        service.assign_rider(&request.id, &rider_a.id)?;

        // a second rider cannot take an already accepted request
        let err = service.assign_rider(&request.id, &rider_b.id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));

        // terminal means terminal
        service.complete_request(&request.id)?;
        let err = service.cancel_request(&request.id).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidState(_)));

        Ok(())
    }

    #[test]
    fn soft_deleted_requests_read_as_missing() -> anyhow::Result<()> {
        let temp_dir = tempdir()?;
        let db = Arc::new(sled::open(temp_dir.path().join("deleted_missing.db"))?);
        let service = DispatchService::new(db);

        let boss = new_uuid_to_bech32("user")?;
        let rider = Rider::new("C", "01700000103", &boss)?;
        service.register_rider(&rider)?;

        let request = service.create_request(draft("user_c"))?;
        service.delete_request(&request.id, "user_c")?;

        let err = service.assign_rider(&request.id, &rider.id).unwrap_err();
        assert!(matches!(err, DispatchError::NotFound { kind: "request", .. }));

        Ok(())
    }
}
