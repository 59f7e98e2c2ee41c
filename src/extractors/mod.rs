pub mod store;

pub use store::{provide_store, with_store};
