use super::parser::{ConfigPath, Marker, Segment};
use crate::model::{ConfigTree, NodeId, NodeKind};
use crate::properties::resolved_properties;

/// One-off value produced by a key lookup; not part of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticValue {
    pub name: String,
    pub value: String,
}

/// Outcome of a path search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Node(NodeId),
    Value(SyntheticValue),
    Many(SearchResultNode),
}

impl SearchResult {
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            SearchResult::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Scalar behind a single result: a value node or a synthetic value
    pub fn value<'a>(&'a self, tree: &'a ConfigTree) -> Option<&'a str> {
        match self {
            SearchResult::Node(id) => tree.node(*id).and_then(|n| n.value()),
            SearchResult::Value(v) => Some(&v.value),
            SearchResult::Many(_) => None,
        }
    }

    /// Every scalar reachable from this result, in match order
    pub fn values<'a>(&'a self, tree: &'a ConfigTree) -> Vec<&'a str> {
        match self {
            SearchResult::Many(many) => many.iter().filter_map(|r| r.value(tree)).collect(),
            single => single.value(tree).into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SearchResult::Many(many) => many.len(),
            _ => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_many(&self) -> bool {
        matches!(self, SearchResult::Many(_))
    }
}

/// Transient wrapper around two or more matches of a wildcard query
///
/// Never stored in a tree and never versioned. Always flat: it does not
/// contain further `Many` results.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SearchResultNode {
    results: Vec<SearchResult>,
}

impl SearchResultNode {
    pub fn results(&self) -> &[SearchResult] {
        &self.results
    }

    pub fn iter(&self) -> impl Iterator<Item = &SearchResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.results.iter().filter_map(SearchResult::as_node).collect()
    }

    /// Re-apply `path` to every contained node and collapse the matches
    pub fn find(&self, tree: &ConfigTree, path: &ConfigPath) -> Option<SearchResult> {
        collapse(
            self.nodes()
                .into_iter()
                .filter_map(|id| find(tree, id, path))
                .collect(),
        )
    }
}

impl IntoIterator for SearchResultNode {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// 0 matches → `None`, 1 → that match, 2 or more → `Many` (flattened)
pub fn collapse(matches: Vec<SearchResult>) -> Option<SearchResult> {
    let mut flat = Vec::with_capacity(matches.len());
    for m in matches {
        match m {
            SearchResult::Many(many) => flat.extend(many.results),
            single => flat.push(single),
        }
    }
    match flat.len() {
        0 => None,
        1 => flat.pop(),
        _ => Some(SearchResult::Many(SearchResultNode { results: flat })),
    }
}

/// Search from `start`; the first path segment must match `start` itself
///
/// Absence is `None`, never an error.
pub fn find(tree: &ConfigTree, start: NodeId, path: &ConfigPath) -> Option<SearchResult> {
    find_from(tree, start, path.segments(), 0)
}

/// Resolve `segments[index..]` with `segments[index]` matched against `node`
pub fn find_from(
    tree: &ConfigTree,
    node: NodeId,
    segments: &[Segment],
    index: usize,
) -> Option<SearchResult> {
    let segment = segments.get(index)?;
    let current = tree.node(node)?;
    if !segment.matches(current.name()) {
        return None;
    }

    if let Segment::Marked { marker, key, .. } = segment {
        return resolve_marker(tree, node, *marker, key.as_deref(), segments, index);
    }

    if index + 1 == segments.len() {
        return Some(SearchResult::Node(node));
    }
    descend(tree, node, segments, index + 1)
}

/// Resolve `segments[next]` among the children of `node`
fn descend(
    tree: &ConfigTree,
    node: NodeId,
    segments: &[Segment],
    next: usize,
) -> Option<SearchResult> {
    let current = tree.node(node)?;
    let segment = segments.get(next)?;
    let is_last = next + 1 == segments.len();

    if let NodeKind::KeyValue { entries, .. } = current.kind() {
        // Entries are leaves: only a final segment can address them
        if !is_last {
            return None;
        }
        return match segment {
            Segment::Name(key) => entries.get(key).map(|value| synthetic(key, value)),
            Segment::Wildcard => collapse(
                entries
                    .iter()
                    .map(|(key, value)| synthetic(key, value))
                    .collect(),
            ),
            Segment::Marked { .. } => None,
        };
    }

    match segment {
        Segment::Wildcard => collapse(
            tree.children(node)
                .into_iter()
                .filter_map(|child| find_from(tree, child, segments, next))
                .collect(),
        ),
        Segment::Name(name) => {
            let child = tree.child(node, name)?;
            find_from(tree, child, segments, next)
        }
        Segment::Marked { name, marker, key } => match tree.child(node, name) {
            Some(child) => find_from(tree, child, segments, next),
            // `$` falls back to the scope of the enclosing node
            None if *marker == Marker::Properties && is_last && current.is_path() => key
                .as_deref()
                .and_then(|k| {
                    resolved_properties(tree, node)
                        .get(k)
                        .map(|value| synthetic(k, value))
                }),
            None => None,
        },
    }
}

/// `node` matched `name<marker>[key]`
fn resolve_marker(
    tree: &ConfigTree,
    node: NodeId,
    marker: Marker,
    key: Option<&str>,
    segments: &[Segment],
    index: usize,
) -> Option<SearchResult> {
    let is_last = index + 1 == segments.len();
    let owner = tree.enclosing_path_node(node)?;

    match key {
        Some(key) if is_last => match marker {
            Marker::Properties => resolved_properties(tree, node)
                .get(key)
                .map(|value| synthetic(key, value)),
            Marker::Parameters | Marker::Attributes => {
                if owner != node {
                    return None;
                }
                let reserved = tree.reserved(node, marker.kind())?;
                tree.get_value(reserved, key).map(|value| synthetic(key, value))
            }
        },
        // A keyed lookup yields a scalar, which has no children
        Some(_) => None,
        None => {
            if owner != node {
                return None;
            }
            let reserved = tree.reserved(node, marker.kind())?;
            if is_last {
                Some(SearchResult::Node(reserved))
            } else {
                descend(tree, reserved, segments, index + 1)
            }
        }
    }
}

fn synthetic(name: &str, value: &str) -> SearchResult {
    SearchResult::Value(SyntheticValue {
        name: name.to_string(),
        value: value.to_string(),
    })
}
