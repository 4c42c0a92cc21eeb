pub mod courier;
pub mod extract;
pub mod learner;
pub mod listing;
pub mod search_url;
pub mod submit;
