pub mod filter;
pub mod history;
pub mod job;
pub mod ledger;
pub mod location;
pub mod pagination;
pub mod place;
pub mod query;
pub mod sub_region;
