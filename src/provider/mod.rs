#[cfg(feature = "google")]
pub mod google;
pub mod stub;
#[cfg(test)]
pub mod testing;
mod types;

pub use types::*;
