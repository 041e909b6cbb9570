pub mod pages;
pub mod redirect;
