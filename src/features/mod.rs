pub mod antibot;
pub mod completion;
pub mod denylist;
pub mod glyph;
pub mod session;
pub mod session_store;
pub mod stealth;
