//! Provider clients - outbound calls to language-model APIs.

mod http;

pub use http::HttpProviderClient;
