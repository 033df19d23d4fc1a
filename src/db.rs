pub mod cursor_store;
pub mod hamamatsu;
pub mod prod_db;
