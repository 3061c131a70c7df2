pub mod admin;
pub mod downloads;
pub mod pages;
