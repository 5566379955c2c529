mod fake;
mod http;

pub use fake::FakeHub;
pub use http::HttpDispatcher;
