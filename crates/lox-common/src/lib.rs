pub mod error;
pub mod stack;
pub mod types;
