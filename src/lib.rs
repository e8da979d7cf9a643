pub mod checks;
pub mod index;
pub mod io;

#[cfg(feature = "with_digest")]
pub mod digest;
