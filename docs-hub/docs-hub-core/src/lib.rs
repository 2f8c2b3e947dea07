pub mod breadcrumb;
pub mod cascade;
pub mod error;
pub mod events;
pub mod forest;
pub mod model;
pub mod ordering;
pub mod orphans;
pub mod persistence;
pub mod tree;

pub use error::{Result, TreeError};
pub use tree::TreeStore;
