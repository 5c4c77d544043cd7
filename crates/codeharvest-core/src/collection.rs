//! Ordered, uid-keyed collection of extracted functions

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::SourceFunction;

/// Columns every row of the tabular projection carries, in order.
pub const BASE_COLUMNS: [&str; 8] = [
    "path",
    "uid",
    "class_name",
    "definition",
    "start_byte",
    "end_byte",
    "language",
    "name",
];

/// Insertion-ordered collection of source functions with at most one entry
/// per uid. The first unit inserted under a uid is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<SourceFunction>", into = "Vec<SourceFunction>")]
pub struct FunctionCollection {
    functions: Vec<SourceFunction>,
    index: HashMap<String, usize>,
}

impl FunctionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the uid is already present. Returns whether it was inserted.
    pub fn insert(&mut self, function: SourceFunction) -> bool {
        if self.index.contains_key(&function.uid) {
            return false;
        }
        self.index.insert(function.uid.clone(), self.functions.len());
        self.functions.push(function);
        true
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.index.contains_key(uid)
    }

    pub fn get(&self, uid: &str) -> Option<&SourceFunction> {
        self.index.get(uid).map(|&i| &self.functions[i])
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceFunction> {
        self.functions.iter()
    }

    pub fn as_slice(&self) -> &[SourceFunction] {
        &self.functions
    }

    pub fn into_vec(self) -> Vec<SourceFunction> {
        self.functions
    }

    /// Column names of the tabular projection: the base columns followed by
    /// every metadata key seen across the collection, sorted.
    pub fn columns(&self) -> Vec<String> {
        let mut extra: Vec<String> = self
            .functions
            .iter()
            .flat_map(|f| f.metadata.keys())
            .filter(|k| !BASE_COLUMNS.contains(&k.as_str()))
            .cloned()
            .collect();
        extra.sort();
        extra.dedup();
        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(extra)
            .collect()
    }

    /// Bulk tabular projection, one row per function in collection order.
    /// Metadata keys missing from a row are filled with `null`.
    pub fn to_rows(&self) -> Vec<BTreeMap<String, Value>> {
        let columns = self.columns();
        self.functions
            .iter()
            .map(|f| {
                let mut row = BTreeMap::new();
                row.insert("path".to_string(), Value::from(f.path.to_string_lossy().into_owned()));
                row.insert("uid".to_string(), Value::from(f.uid.clone()));
                row.insert(
                    "class_name".to_string(),
                    f.class_name.clone().map(Value::from).unwrap_or(Value::Null),
                );
                row.insert("definition".to_string(), Value::from(f.definition.clone()));
                row.insert("start_byte".to_string(), Value::from(f.start_byte));
                row.insert("end_byte".to_string(), Value::from(f.end_byte));
                row.insert("language".to_string(), Value::from(f.language.clone()));
                row.insert("name".to_string(), Value::from(f.name.clone()));
                for column in &columns[BASE_COLUMNS.len()..] {
                    row.insert(
                        column.clone(),
                        f.metadata.get(column).cloned().unwrap_or(Value::Null),
                    );
                }
                row
            })
            .collect()
    }
}

impl From<Vec<SourceFunction>> for FunctionCollection {
    fn from(functions: Vec<SourceFunction>) -> Self {
        functions.into_iter().collect()
    }
}

impl From<FunctionCollection> for Vec<SourceFunction> {
    fn from(collection: FunctionCollection) -> Self {
        collection.functions
    }
}

impl FromIterator<SourceFunction> for FunctionCollection {
    fn from_iter<I: IntoIterator<Item = SourceFunction>>(iter: I) -> Self {
        let mut collection = FunctionCollection::new();
        for function in iter {
            collection.insert(function);
        }
        collection
    }
}

impl IntoIterator for FunctionCollection {
    type Item = SourceFunction;
    type IntoIter = std::vec::IntoIter<SourceFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.into_iter()
    }
}

impl<'a> IntoIterator for &'a FunctionCollection {
    type Item = &'a SourceFunction;
    type IntoIter = std::slice::Iter<'a, SourceFunction>;

    fn into_iter(self) -> Self::IntoIter {
        self.functions.iter()
    }
}
