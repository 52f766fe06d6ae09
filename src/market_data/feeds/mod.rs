pub mod book_ws;
pub mod funding;
pub mod geo;
pub mod ohlcv;
