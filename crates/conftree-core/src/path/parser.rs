use std::fmt;
use std::str::FromStr;

use crate::errors::{ConfigError, Result};
use crate::model::KeyValueKind;

/// Shorthand for reaching into a reserved key-value child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// `#`
    Parameters,
    /// `@`
    Attributes,
    /// `$`
    Properties,
}

impl Marker {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(Marker::Parameters),
            '@' => Some(Marker::Attributes),
            '$' => Some(Marker::Properties),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Marker::Parameters => '#',
            Marker::Attributes => '@',
            Marker::Properties => '$',
        }
    }

    pub fn kind(&self) -> KeyValueKind {
        match self {
            Marker::Parameters => KeyValueKind::Parameters,
            Marker::Attributes => KeyValueKind::Attributes,
            Marker::Properties => KeyValueKind::Properties,
        }
    }
}

/// One `.`-separated piece of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// `*`, matches any single node
    Wildcard,
    /// Plain node name
    Name(String),
    /// `name<marker>key`; without a key the segment addresses the reserved
    /// node itself
    Marked {
        name: String,
        marker: Marker,
        key: Option<String>,
    },
}

impl Segment {
    /// Node name this segment must match, `None` for a wildcard
    pub fn name(&self) -> Option<&str> {
        match self {
            Segment::Wildcard => None,
            Segment::Name(name) | Segment::Marked { name, .. } => Some(name),
        }
    }

    pub fn matches(&self, node_name: &str) -> bool {
        self.name().map_or(true, |name| name == node_name)
    }

    fn parse(raw: &str, path: &str) -> Result<Self> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("empty segment"));
        }
        if raw.contains('/') {
            return Err(invalid("'/' is not allowed in a path"));
        }
        if raw == "*" {
            return Ok(Segment::Wildcard);
        }

        let Some(pos) = raw.find(['#', '@', '$']) else {
            if raw.contains('*') {
                return Err(invalid("'*' must be a whole segment"));
            }
            return Ok(Segment::Name(raw.to_string()));
        };

        let (name, rest) = raw.split_at(pos);
        if name == "*" {
            return Err(invalid("a marker cannot follow a wildcard"));
        }
        if name.is_empty() {
            return Err(invalid("a marker needs a node name before it"));
        }
        if name.contains('*') {
            return Err(invalid("'*' must be a whole segment"));
        }

        let mut chars = rest.chars();
        let marker = chars
            .next()
            .and_then(Marker::from_char)
            .ok_or_else(|| invalid("unknown marker"))?;
        let key = chars.as_str();
        if key.contains(['#', '@', '$', '*']) {
            return Err(invalid("a segment holds at most one marker"));
        }

        Ok(Segment::Marked {
            name: name.to_string(),
            marker,
            key: (!key.is_empty()).then(|| key.to_string()),
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Wildcard => write!(f, "*"),
            Segment::Name(name) => write!(f, "{}", name),
            Segment::Marked { name, marker, key } => {
                write!(f, "{}{}{}", name, marker.as_char(), key.as_deref().unwrap_or(""))
            }
        }
    }
}

/// Parsed dot-path query
///
/// The first segment matches the node the search starts from, so a search
/// from the root reads `root.child.leaf`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<Segment>,
}

impl ConfigPath {
    /// Parse a dot-path
    ///
    /// # Errors
    ///
    /// Returns `InvalidPath` for empty input, empty segments, `/`, a marker
    /// with no name in front of it, or a marker after `*`.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(ConfigError::InvalidPath {
                path: input.to_string(),
                reason: "path cannot be empty".to_string(),
            });
        }
        let segments = input
            .split('.')
            .map(|raw| Segment::parse(raw, input))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Option<Self> {
        (!segments.is_empty()).then_some(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> &Segment {
        // parse and from_segments never build an empty path
        &self.segments[self.segments.len() - 1]
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.contains(&Segment::Wildcard)
    }

    /// Append a plain name segment
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Name(name.to_string()));
        Self { segments }
    }
}

impl FromStr for ConfigPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_plain_and_wildcard() {
        let path = ConfigPath::parse("cfg.*.host").unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Name("cfg".to_string()),
                Segment::Wildcard,
                Segment::Name("host".to_string()),
            ]
        );
        assert!(path.has_wildcard());
    }

    #[test]
    fn test_parse_markers() {
        let path = ConfigPath::parse("cfg.db#pool.db@owner.db$host.db$").unwrap();
        let segs = path.segments();
        assert_eq!(
            segs[1],
            Segment::Marked {
                name: "db".to_string(),
                marker: Marker::Parameters,
                key: Some("pool".to_string())
            }
        );
        assert!(matches!(&segs[2], Segment::Marked { marker: Marker::Attributes, .. }));
        assert!(matches!(&segs[3], Segment::Marked { marker: Marker::Properties, .. }));
        assert!(matches!(&segs[4], Segment::Marked { key: None, .. }));
    }

    #[test]
    fn test_parse_rejections() {
        for bad in ["", "a..b", ".a", "a.", "a/b", "$host", "a.#x", "*$host", "a.b*", "a$b$c"] {
            assert!(
                matches!(ConfigPath::parse(bad), Err(ConfigError::InvalidPath { .. })),
                "expected InvalidPath for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_marker_kinds() {
        assert_eq!(Marker::Parameters.kind(), KeyValueKind::Parameters);
        assert_eq!(Marker::Attributes.kind(), KeyValueKind::Attributes);
        assert_eq!(Marker::Properties.kind(), KeyValueKind::Properties);
    }

    proptest! {
        #[test]
        fn prop_display_round_trips(
            names in prop::collection::vec("[a-z][a-z0-9_]{0,6}", 1..6),
            marker in prop::option::of(prop::sample::select(vec!['#', '@', '$'])),
        ) {
            let mut raw = names.join(".");
            if let Some(m) = marker {
                raw.push(m);
                raw.push_str("key");
            }
            let parsed = ConfigPath::parse(&raw).unwrap();
            prop_assert_eq!(parsed.to_string(), raw);
            prop_assert_eq!(parsed.len(), names.len());
        }

        #[test]
        fn prop_empty_segment_rejected(names in prop::collection::vec("[a-z]{1,4}", 1..4)) {
            let raw = format!("{}..x", names.join("."));
            prop_assert!(ConfigPath::parse(&raw).is_err());
        }
    }
}
