pub mod assignment;
pub mod error;
pub mod ledger;
pub mod money;
pub mod pricing;
pub mod request;
pub mod rider;
pub mod service;
pub mod store;
pub mod utils;
pub mod wallet;
