mod http;
mod line;

pub use http::{HttpSink, HttpSinkConfig};
pub use line::encode_batch;
