pub mod algo;
pub mod digest_output;
