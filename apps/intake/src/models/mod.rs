pub mod candidate;
pub mod group;
pub mod resume;
pub mod search;
pub mod upload;
