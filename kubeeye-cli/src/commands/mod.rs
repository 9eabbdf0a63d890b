pub mod analyze;
pub mod kinds;
pub mod logs;
pub mod resource;
pub mod usage;
