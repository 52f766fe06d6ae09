pub mod snapshots;
pub mod store;
pub mod trade_form;
