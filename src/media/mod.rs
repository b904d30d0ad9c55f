#[cfg(feature = "compositor")]
pub mod decode;
pub mod probe;
pub mod tools;
