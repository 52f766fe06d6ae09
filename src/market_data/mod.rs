pub mod book;
pub mod feeds;
pub mod types;
