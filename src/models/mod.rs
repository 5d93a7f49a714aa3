pub mod posting;
pub mod site;

pub use posting::{NewPosting, Posting, fingerprint, href_id, url_id};
pub use site::SiteConfig;
