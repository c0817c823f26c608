pub mod broadcast;
pub mod summary;
