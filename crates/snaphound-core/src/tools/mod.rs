pub mod common;
pub mod rga;
