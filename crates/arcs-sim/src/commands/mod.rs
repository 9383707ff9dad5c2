pub mod group;
pub mod import;
