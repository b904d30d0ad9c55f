pub mod manifest;
pub(crate) mod mix;
