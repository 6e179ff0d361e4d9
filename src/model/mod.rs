pub mod enums;
pub mod flag;
