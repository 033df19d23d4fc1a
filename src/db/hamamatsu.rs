pub mod certified_shops;
pub mod transform;
