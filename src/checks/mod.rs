pub mod checker;
pub mod coverage;
pub mod statistics;
pub mod validation;
