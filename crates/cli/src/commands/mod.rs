pub mod groups;
pub mod pods;
pub mod predict;
