pub mod patient;
pub mod value;

pub use patient::*;
pub use value::*;
