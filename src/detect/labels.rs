use std::borrow::Cow;
use std::path::Path;

/// Name used by the decoder for indices past the end of the label list.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Ordered class names, addressed by class index.
///
/// A short or missing list is never an error; lookups fall back to
/// [`UNKNOWN_LABEL`] or to a synthesized `class_<id>` name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a labels file body: one name per line, reading stops at the
    /// first empty line.
    pub fn parse(body: &str) -> Self {
        Self::new(
            body.lines()
                .map(|line| line.trim_end_matches('\r'))
                .take_while(|line| !line.is_empty()),
        )
    }

    /// Load labels from disk. An unreadable file yields an empty set.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(body) => {
                let labels = Self::parse(&body);
                log::info!("loaded {} labels from {}", labels.len(), path.display());
                labels
            }
            Err(e) => {
                log::warn!(
                    "labels unavailable at {} ({}); classes will be reported as {}",
                    path.display(),
                    e,
                    UNKNOWN_LABEL
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Name for `index`, or [`UNKNOWN_LABEL`].
    pub fn resolve(&self, index: usize) -> &str {
        self.get(index).unwrap_or(UNKNOWN_LABEL)
    }

    /// Name for `index`, or `class_<index>`.
    pub fn resolve_or_synthesize(&self, index: usize) -> Cow<'_, str> {
        match self.get(index) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("class_{}", index)),
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stops_at_first_blank_line() {
        let labels = LabelSet::parse("person\r\nbicycle\ncar\n\nignored\n");
        assert_eq!(labels.len(), 3);
        assert_eq!(labels.get(1), Some("bicycle"));
        assert_eq!(labels.index_of("car"), Some(2));
        assert_eq!(labels.index_of("ignored"), None);
    }

    #[test]
    fn out_of_range_index_falls_back() {
        let labels = LabelSet::new(["person"]);
        assert_eq!(labels.resolve(0), "person");
        assert_eq!(labels.resolve(7), UNKNOWN_LABEL);
        assert_eq!(labels.resolve_or_synthesize(0), "person");
        assert_eq!(labels.resolve_or_synthesize(7), "class_7");
    }

    #[test]
    fn missing_file_degrades_to_empty() {
        let labels = LabelSet::load(Path::new("/nonexistent/labels.txt"));
        assert!(labels.is_empty());
        assert_eq!(labels.resolve(0), UNKNOWN_LABEL);
    }
}
