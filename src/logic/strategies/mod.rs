pub mod dlite;
pub mod filter;
pub mod parse;
pub mod resource;

pub use dlite::{materialise, shape_for, store_structures, DliteParseStrategy};
pub use filter::FilterStrategy;
pub use parse::ParseStrategy;
pub use resource::ResourceParseStrategy;
