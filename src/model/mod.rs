pub mod common;
pub mod config;
pub mod entity;
pub mod query;
pub mod record;
pub mod resource;
pub mod response;
pub mod session;
pub mod url;

pub use common::*;
pub use self::config::*;
pub use entity::*;
pub use query::*;
pub use record::*;
pub use resource::*;
pub use response::*;
pub use session::*;
pub use self::url::*;
