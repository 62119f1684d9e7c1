pub mod normalizer;
pub mod pg_store;
pub mod store;

pub use normalizer::*;
pub use store::*;
