//! Resource model built from `sdm status` output
//!
//! A model is immutable once parsed. Each successful poll with changed
//! output replaces it wholesale.

use serde::Serialize;
use std::cmp::Ordering;

/// Kind of resource listed in a status section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Datasource,
    Server,
    Website,
}

impl SectionKind {
    /// Header token as emitted by the tool, including its leading space
    pub fn header(self) -> &'static str {
        match self {
            SectionKind::Datasource => " DATASOURCE",
            SectionKind::Server => " SERVER",
            SectionKind::Website => " WEBSITE",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SectionKind::Datasource => "Datasources",
            SectionKind::Server => "Servers (ssh)",
            SectionKind::Website => "Websites",
        }
    }

    /// Icon name shown next to the section group
    pub fn icon(self) -> &'static str {
        match self {
            SectionKind::Datasource => "media-floppy-symbolic",
            SectionKind::Server => "utilities-terminal-symbolic",
            SectionKind::Website => "video-display-symbolic",
        }
    }

    /// Detect a section header line
    pub fn from_header(line: &str) -> Option<Self> {
        [SectionKind::Datasource, SectionKind::Server, SectionKind::Website]
            .into_iter()
            .find(|kind| line.starts_with(kind.header()))
    }

    /// Whether entries of this kind carry a connection flag
    pub fn is_connectable(self) -> bool {
        !matches!(self, SectionKind::Website)
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectionKind::Datasource => write!(f, "DATASOURCE"),
            SectionKind::Server => write!(f, "SERVER"),
            SectionKind::Website => write!(f, "WEBSITE"),
        }
    }
}

/// One resource line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Entry {
    /// Server or datasource with its connection state
    Resource { name: String, active: bool },
    /// Website; `url` is the remainder after the literal `http`
    Website { name: String, url: String },
}

impl Entry {
    pub fn resource(name: impl Into<String>, active: bool) -> Self {
        Entry::Resource {
            name: name.into(),
            active,
        }
    }

    pub fn website(name: impl Into<String>, url: impl Into<String>) -> Self {
        Entry::Website {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entry::Resource { name, .. } | Entry::Website { name, .. } => name,
        }
    }

    /// Websites are never active
    pub fn is_active(&self) -> bool {
        matches!(self, Entry::Resource { active: true, .. })
    }

    /// Full URL to hand to the opener, `None` for servers and datasources
    pub fn open_url(&self) -> Option<String> {
        match self {
            Entry::Website { url, .. } => Some(format!("http{url}")),
            Entry::Resource { .. } => None,
        }
    }
}

/// Menu ordering: active entries first, then by name ignoring case,
/// ties broken by the exact name.
pub fn compare_entries(a: &Entry, b: &Entry) -> Ordering {
    b.is_active()
        .cmp(&a.is_active())
        .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        .then_with(|| a.name().cmp(b.name()))
}

/// A group of resources of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub kind: SectionKind,
    pub display_name: String,
    pub entries: Vec<Entry>,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Self {
            kind,
            display_name: kind.display_name().to_string(),
            entries: Vec::new(),
        }
    }

    /// Entries in menu order; the section itself stays untouched.
    pub fn sorted_entries(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.iter().collect();
        entries.sort_by(|a, b| compare_entries(a, b));
        entries
    }

    pub fn active_count(&self) -> usize {
        if !self.kind.is_connectable() {
            return 0;
        }
        self.entries.iter().filter(|e| e.is_active()).count()
    }
}

/// Parsed status, sections in the order the tool printed them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceModel {
    pub sections: Vec<Section>,
}

impl ResourceModel {
    pub fn new(sections: Vec<Section>) -> Self {
        Self { sections }
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Active servers and datasources across all sections
    pub fn active_count(&self) -> usize {
        self.sections.iter().map(Section::active_count).sum()
    }

    /// Active server entries in menu order, for the quick-access list
    pub fn active_servers(&self) -> Vec<&Entry> {
        let mut servers: Vec<&Entry> = self
            .sections
            .iter()
            .filter(|s| s.kind == SectionKind::Server)
            .flat_map(|s| s.entries.iter())
            .filter(|e| e.is_active())
            .collect();
        servers.sort_by(|a, b| compare_entries(a, b));
        servers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_active_first_then_alphabetical() {
        let mut section = Section::new(SectionKind::Server);
        section.entries = vec![
            Entry::resource("b", false),
            Entry::resource("a", true),
            Entry::resource("c", true),
        ];

        let names: Vec<&str> = section.sorted_entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_sort_ignores_case() {
        let mut section = Section::new(SectionKind::Datasource);
        section.entries = vec![
            Entry::resource("beta", false),
            Entry::resource("Alpha", false),
            Entry::resource("alpha", false),
        ];

        let names: Vec<&str> = section.sorted_entries().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["Alpha", "alpha", "beta"]);
    }

    #[test]
    fn test_active_count_skips_websites() {
        let mut servers = Section::new(SectionKind::Server);
        servers.entries = vec![Entry::resource("web", true), Entry::resource("db", false)];
        let mut datasources = Section::new(SectionKind::Datasource);
        datasources.entries = vec![Entry::resource("pg", true)];
        let mut websites = Section::new(SectionKind::Website);
        websites.entries = vec![Entry::website("Wiki", "s://wiki.example.com")];

        let model = ResourceModel::new(vec![servers, datasources, websites]);
        assert_eq!(model.active_count(), 2);
        assert_eq!(model.active_servers().len(), 1);
    }

    #[test]
    fn test_header_detection() {
        assert_eq!(
            SectionKind::from_header(" SERVER STATUS PORT TYPE"),
            Some(SectionKind::Server)
        );
        assert_eq!(SectionKind::from_header("SERVER"), None);
        assert_eq!(SectionKind::from_header(" web-1 1 ssh"), None);
    }

    #[test]
    fn test_website_open_url() {
        let entry = Entry::website("Wiki", "s://wiki.example.com");
        assert_eq!(entry.open_url().as_deref(), Some("https://wiki.example.com"));
        assert!(!entry.is_active());
        assert_eq!(Entry::resource("db", true).open_url(), None);
    }
}
