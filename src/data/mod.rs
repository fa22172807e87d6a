pub mod generator;
pub mod storage;
pub mod store;
