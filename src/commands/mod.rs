pub mod digest;
pub mod run;
pub mod sync;
