pub mod registry;
pub mod types;


pub use registry::*;
pub use types::*;
