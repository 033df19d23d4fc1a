pub mod config;
pub mod db;
pub mod errors;
pub mod job;
pub mod utils;
