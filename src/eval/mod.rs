pub mod evaluators;
pub mod manager;
pub mod matcher;
pub mod result;
