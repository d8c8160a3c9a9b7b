pub mod driver;
pub mod element;
pub mod error;
mod form;
pub mod keys;
pub mod navigation;
pub mod options;
mod page;
