pub mod core;
pub mod features;
pub mod scraping;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::{ScoutConfig, SiteProfile, Timings};

// --- Short module paths ---
pub use features::{antibot, completion, denylist, glyph, session, session_store, stealth};
pub use scraping::{browser_manager, cdp, page};
pub use tools::{courier, extract, learner, listing, search_url, submit};
