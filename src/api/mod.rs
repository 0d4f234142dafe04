pub mod payload;
pub mod rest;
