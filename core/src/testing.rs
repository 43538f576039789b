pub mod executor;
pub mod launch;
pub mod result;
pub mod testcase;

pub use executor::*;
pub use launch::*;
pub use result::*;
pub use testcase::*;
