//! Entity formatter.
//!
//! Shapes a single backend payload before it reaches the merge or
//! concurrent stages. Steps always run in the same order:
//!
//! ```text
//! target extraction → allow/deny filtering → renaming → grouping
//! ```
//!
//! The formatter never fails. Missing paths and non-object values only make
//! the output smaller.

use std::collections::HashMap;

use serde_json::Value;

use crate::config::BackendConfig;
use crate::proxy::response::{Data, Response};

#[derive(Debug, Clone, Default)]
pub struct EntityFormatter {
    target: Option<Vec<String>>,
    filter: FieldFilter,
    mapping: Vec<(String, String)>,
    group: Option<String>,
}

#[derive(Debug, Clone, Default)]
enum FieldFilter {
    #[default]
    None,
    Allow(AllowTree),
    Deny(Vec<Vec<String>>),
}

/// Allowed paths folded into a tree keyed by segment.
#[derive(Debug, Clone, Default)]
struct AllowTree {
    keep_all: bool,
    children: HashMap<String, AllowTree>,
}

impl AllowTree {
    fn insert(&mut self, path: &[String]) {
        match path.split_first() {
            None => self.keep_all = true,
            Some((head, rest)) => self.children.entry(head.clone()).or_default().insert(rest),
        }
    }

    fn prune(&self, data: Data) -> Data {
        data.into_iter()
            .filter_map(|(key, value)| {
                let node = self.children.get(&key)?;
                if node.keep_all {
                    return Some((key, value));
                }
                match value {
                    Value::Object(inner) => {
                        let pruned = node.prune(inner);
                        (!pruned.is_empty()).then(|| (key, Value::Object(pruned)))
                    }
                    _ => None,
                }
            })
            .collect()
    }
}

impl EntityFormatter {
    /// Build the formatter for one backend.
    pub fn new(backend: &BackendConfig) -> Self {
        let filter = if !backend.allow.is_empty() {
            let mut tree = AllowTree::default();
            for path in &backend.allow {
                tree.insert(&split_path(path));
            }
            FieldFilter::Allow(tree)
        } else if !backend.deny.is_empty() {
            FieldFilter::Deny(backend.deny.iter().map(|p| split_path(p)).collect())
        } else {
            FieldFilter::None
        };

        let mut mapping: Vec<(String, String)> = backend
            .mapping
            .iter()
            .filter_map(|(old, new)| {
                let head = old.split('.').next().filter(|s| !s.is_empty())?;
                Some((head.to_string(), new.clone()))
            })
            .collect();
        mapping.sort();

        Self {
            target: backend
                .target
                .as_deref()
                .map(split_path)
                .filter(|path| !path.is_empty()),
            filter,
            mapping,
            group: backend.group.clone().filter(|g| !g.is_empty()),
        }
    }

    /// Format the data of a response in place.
    pub fn format(&self, mut response: Response) -> Response {
        response.data = self.format_data(response.data);
        response
    }

    pub fn format_data(&self, mut data: Data) -> Data {
        if let Some(target) = &self.target {
            data = extract_target(data, target);
        }

        match &self.filter {
            FieldFilter::None => {}
            FieldFilter::Allow(tree) => data = tree.prune(data),
            FieldFilter::Deny(paths) => {
                for path in paths {
                    remove_path(&mut data, path);
                }
            }
        }

        for (old, new) in &self.mapping {
            if let Some(value) = data.remove(old) {
                data.insert(new.clone(), value);
            }
        }

        if let Some(group) = &self.group {
            let mut grouped = Data::new();
            grouped.insert(group.clone(), Value::Object(data));
            data = grouped;
        }

        data
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_target(data: Data, path: &[String]) -> Data {
    let mut current = Value::Object(data);
    for segment in path {
        current = match current {
            Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
            _ => return Data::new(),
        };
    }
    match current {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

fn remove_path(data: &mut Data, path: &[String]) {
    match path {
        [] => {}
        [last] => {
            data.remove(last);
        }
        [head, rest @ ..] => {
            if let Some(Value::Object(inner)) = data.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}
