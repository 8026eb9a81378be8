pub mod catalog;
pub mod category;
pub mod config;
pub mod custom;
pub mod enquiry;
pub mod image;
pub mod lead;
pub mod product;
pub mod query;
pub mod session;
pub mod sheets;
pub mod storage;
pub mod visit;
