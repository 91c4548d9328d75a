//! Conversation state.

pub mod thread;

pub use thread::ChatThread;
