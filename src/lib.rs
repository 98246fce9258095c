pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod images;
pub mod models;
pub mod paginate;
pub mod scrapers;
pub mod signing;
pub mod storage;
pub mod utils;
