pub mod events;
pub mod handler;
pub mod transport;
pub mod types;


pub use events::*;
pub use handler::*;
pub use transport::*;
pub use types::*;
