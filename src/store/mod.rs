pub mod cache;
pub mod entities;
pub mod memory;
pub mod traits;
pub mod transport;

pub use cache::*;
pub use memory::*;
pub use traits::*;
pub use transport::*;
