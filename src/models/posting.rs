use serde::Serialize;
use sha1::{Digest, Sha1};

/// A normalized job posting. Only collectors build these, through [`NewPosting`],
/// and nothing mutates one afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    id: String,
    title: String,
    location: String,
    url: String,
    source: String,
}

/// Raw fields mapped out of an upstream payload, before id resolution.
#[derive(Debug, Default, Clone)]
pub struct NewPosting {
    pub id: String,
    pub title: String,
    pub location: String,
    pub url: String,
}

impl NewPosting {
    /// Seal the record. An empty id falls back to a digest of the URL,
    /// then to the title.
    pub fn finish(self, source: &str) -> Posting {
        let id = self.id.trim();
        let id = if !id.is_empty() {
            id.to_string()
        } else if !self.url.is_empty() {
            url_id(&self.url)
        } else {
            self.title.trim().to_string()
        };

        Posting {
            id,
            title: self.title,
            location: self.location,
            url: self.url,
            source: source.to_string(),
        }
    }
}

impl Posting {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Identity used for change detection. See [`fingerprint`].
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.id, &self.title, &self.url)
    }

    /// Text the relevance filter searches: title, location and url.
    pub fn haystack(&self) -> String {
        format!("{} {} {}", self.title, self.location, self.url)
    }

    /// One line of the aggregated notification.
    pub fn digest_line(&self) -> String {
        let location = if self.location.is_empty() {
            "n/a"
        } else {
            &self.location
        };
        format!("- {} | {} [{}]\n{}", self.title, location, self.source, self.url)
    }
}

/// Hex SHA-1 of `id + title + url`.
///
/// Location and source are not part of the identity, so two backends that
/// publish the same triple collapse into one notification.
pub fn fingerprint(id: &str, title: &str, url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(id.as_bytes());
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short stable identifier derived from a URL, for backends that expose none:
/// the first 12 hex digits of its SHA-1.
pub fn url_id(url: &str) -> String {
    let digest = Sha1::digest(url.as_bytes());
    hex::encode(&digest[..6])
}

/// Identifier of a link scraped from a rendered page: hex MD5 of the raw href.
pub fn href_id(href: &str) -> String {
    format!("{:x}", md5::compute(href.as_bytes()))
}
