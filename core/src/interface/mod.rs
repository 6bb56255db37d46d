//! Remote analysis client: wire bodies and the HTTP implementation of the
//! backend capabilities.

pub mod http;
pub mod wire;

pub use http::HttpBackend;
