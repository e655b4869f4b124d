//! Request and response types passed between the host, the cache, and the
//! network.

pub mod request;
pub mod response;

pub use request::{Method, Request};
pub use response::{Response, ResponseType};
