pub mod backend;
pub mod command;
pub mod handler;
pub mod tool;
pub mod version;

pub use handler::run;
