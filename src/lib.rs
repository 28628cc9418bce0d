pub mod config;
pub mod feed;
pub mod grading;
pub mod output;
pub mod session;
pub mod stderr_buffer;
pub mod tui;
