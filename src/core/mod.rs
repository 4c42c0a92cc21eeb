pub mod config;
pub mod site;
pub mod timings;
pub mod types;

pub use config::ScoutConfig;
pub use site::SiteProfile;
pub use timings::Timings;
