pub mod job;
pub mod printer;
