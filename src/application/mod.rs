pub mod assemble;
pub mod content;
pub mod error;
pub mod events;
pub mod forms;
pub mod groups;
pub mod pages;
pub mod repos;
