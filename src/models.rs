use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category name used for links that have none.
pub const UNCATEGORIZED: &str = "uncategorized";

/// A go link: an alias pointing at a target URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub alias: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Link {
    /// Build a link stamped with the current time. Blank description or
    /// category are stored as absent.
    pub fn new(
        alias: impl Into<String>,
        url: impl Into<String>,
        description: Option<&str>,
        category: Option<&str>,
    ) -> Self {
        let now = Utc::now();
        Self {
            alias: alias.into(),
            url: url.into(),
            description: non_blank(description),
            category: non_blank(category),
            created_at: now,
            updated_at: now,
        }
    }

    /// Lowercased category, or [`UNCATEGORIZED`].
    pub fn category_key(&self) -> String {
        match self.category.as_deref() {
            Some(cat) => cat.to_lowercase(),
            None => UNCATEGORIZED.to_owned(),
        }
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

/// Links sharing one category, used for the index page and `list` output.
#[derive(Debug, Clone)]
pub struct CategoryGroup {
    pub name: String,
    pub links: Vec<Link>,
}

/// Group links by lowercase category. Groups come back sorted by name and
/// links within a group sorted by alias.
pub fn group_by_category(links: Vec<Link>) -> Vec<CategoryGroup> {
    let mut groups: BTreeMap<String, Vec<Link>> = BTreeMap::new();
    for link in links {
        groups.entry(link.category_key()).or_default().push(link);
    }

    groups
        .into_iter()
        .map(|(name, mut links)| {
            links.sort_by(|a, b| a.alias.cmp(&b.alias));
            CategoryGroup { name, links }
        })
        .collect()
}

/// One line of the category tree shown on the index page and by `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    /// Box-drawing connectors, e.g. `"│   ├── "`
    pub prefix: String,
    /// Category name, or the link alias
    pub text: String,
    /// Target URL for link rows; `None` for category rows
    pub url: Option<String>,
    pub description: Option<String>,
}

/// Lay out groups as a tree:
///
/// ```text
/// ├── personal
/// │   └── cal
/// └── work
///     ├── drive
///     └── zoom
/// ```
pub fn tree_rows(groups: &[CategoryGroup]) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        let last_group = i + 1 == groups.len();
        rows.push(TreeRow {
            prefix: if last_group { "└── " } else { "├── " }.to_owned(),
            text: group.name.clone(),
            url: None,
            description: None,
        });

        let indent = if last_group { "    " } else { "│   " };
        for (j, link) in group.links.iter().enumerate() {
            let branch = if j + 1 == group.links.len() {
                "└── "
            } else {
                "├── "
            };
            rows.push(TreeRow {
                prefix: format!("{indent}{branch}"),
                text: link.alias.clone(),
                url: Some(link.url.clone()),
                description: link.description.clone(),
            });
        }
    }
    rows
}
