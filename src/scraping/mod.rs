pub mod browser_manager;
pub mod cdp;
pub mod page;

pub use cdp::{CdpContext, CdpPage};
pub use page::{BrowsingContext, Page};
