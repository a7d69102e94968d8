//! Request templating and HTTP execution.
mod executor;
mod template;


pub use executor::{AttemptResponse, HttpExecutor, ReqwestExecutor};
pub use template::{AttemptRequest, RequestTemplate, parse_raw_header};
