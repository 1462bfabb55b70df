//! Path to group mapping
//!
//! The mapping is data: an ordered rule list plus a default. It is total, so
//! every classified path lands in some group.

use serde::{Deserialize, Serialize};

/// Where a path goes when no rule matches
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DefaultGroup {
    /// Mirror the file's directory
    #[default]
    Directory,
    /// A fixed group path, `""` for the main group
    Fixed(String),
}

impl From<String> for DefaultGroup {
    fn from(s: String) -> Self {
        if s == "directory" {
            DefaultGroup::Directory
        } else {
            DefaultGroup::Fixed(s)
        }
    }
}

impl From<DefaultGroup> for String {
    fn from(d: DefaultGroup) -> Self {
        match d {
            DefaultGroup::Directory => "directory".to_string(),
            DefaultGroup::Fixed(s) => s,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRule {
    /// Directory prefix the path must live under
    pub prefix: String,
    /// Destination group path, segments separated by `/`
    pub group: String,
    /// Restrict the rule to these extensions (any when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
}

impl GroupRule {
    fn matches(&self, path: &str) -> bool {
        let prefix = self.prefix.trim_end_matches('/');
        let under = prefix.is_empty()
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'));
        under && (self.extensions.is_empty() || self.extensions.iter().any(|e| has_extension(path, e)))
    }
}

fn has_extension(path: &str, ext: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, found)| found.eq_ignore_ascii_case(ext.trim_start_matches('.')))
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupLayout {
    #[serde(default)]
    pub default: DefaultGroup,
    #[serde(default)]
    pub rules: Vec<GroupRule>,
}

impl GroupLayout {
    /// Group path segments for `path`; empty means the main group
    pub fn group_for(&self, path: &str) -> Vec<String> {
        let target = match self.rules.iter().find(|rule| rule.matches(path)) {
            Some(rule) => rule.group.as_str(),
            None => match &self.default {
                DefaultGroup::Directory => path.rsplit_once('/').map_or("", |(dir, _)| dir),
                DefaultGroup::Fixed(group) => group.as_str(),
            },
        };
        segments(target)
    }
}

fn segments(group: &str) -> Vec<String> {
    group
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
