pub mod auth;
pub mod form;
pub mod registry;
pub mod server;

pub use registry::AppRegistry;
