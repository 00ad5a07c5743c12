pub mod initialize_jar;
pub mod submit_tip;
pub mod withdraw_all;

pub use initialize_jar::*;
pub use submit_tip::*;
pub use withdraw_all::*;
