pub mod catalog;
pub mod golden;
pub mod optimize;
pub mod serve;
