use crate::models::Posting;

/// Case-insensitive keyword match over title, location and url.
#[derive(Debug, Clone, Default)]
pub struct Keywords {
    lowered: Vec<String>,
}

impl Keywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lowered: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// True when any keyword occurs in the posting's text. An empty keyword
    /// list matches nothing.
    pub fn matches(&self, posting: &Posting) -> bool {
        let text = posting.haystack().to_lowercase();
        self.lowered.iter().any(|k| text.contains(k.as_str()))
    }

    /// Pre-filtered sources are trusted to have narrowed results server-side.
    pub fn admits(&self, posting: &Posting, pre_filtered: bool) -> bool {
        pre_filtered || self.matches(posting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPosting;

    fn posting(title: &str, location: &str, url: &str) -> Posting {
        NewPosting {
            id: "1".into(),
            title: title.into(),
            location: location.into(),
            url: url.into(),
        }
        .finish("test")
    }

    #[test]
    fn matches_any_field_ignoring_case() {
        let kw = Keywords::new(["VIE", "volontariat"]);
        assert!(kw.matches(&posting("Analyste vie", "", "")));
        assert!(kw.matches(&posting("Analyst", "Programme Volontariat", "")));
        assert!(kw.matches(&posting("Analyst", "", "https://x/jobs/VIE-123")));
        assert!(!kw.matches(&posting("Analyst", "Paris", "https://x/jobs/1")));
    }

    #[test]
    fn empty_keywords_match_nothing() {
        let kw = Keywords::new(Vec::<String>::new());
        assert!(!kw.matches(&posting("VIE Analyst", "", "")));
        let blank = Keywords::new(["  "]);
        assert!(!blank.matches(&posting("VIE Analyst", "", "")));
    }

    #[test]
    fn pre_filtered_bypasses_keywords() {
        let kw = Keywords::new(["VIE"]);
        let p = posting("Graduate Program", "Lyon", "https://x/1");
        assert!(!kw.admits(&p, false));
        assert!(kw.admits(&p, true));
    }
}
