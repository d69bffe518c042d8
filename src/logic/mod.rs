pub mod classify;
pub mod disambiguate;
pub mod flatten;
pub mod merge;
pub mod resolve;
pub mod strategies;
pub mod unflatten;
pub mod validate;

pub use classify::*;
pub use disambiguate::*;
pub use flatten::{flatten, flatten_nested, flatten_single};
pub use merge::*;
pub use resolve::*;
pub use strategies::*;
pub use unflatten::*;
pub use validate::*;
