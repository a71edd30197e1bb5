pub mod json;

pub use json::{JsonBody, JsonBodyRejection};
