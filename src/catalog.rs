use crate::error::{Result, SpotError};
use crate::layout::{ItemIndex, ITEM_COUNT};
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use serde::Deserialize;

static ITEM_SET_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/item_sets");

/// Named trio of items; labels double as cue tags in reports.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct ItemSet {
    pub name: String,
    pub items: Vec<String>,
}

impl ItemSet {
    pub fn load(name: &str) -> Result<Self> {
        let file = ITEM_SET_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| SpotError::UnknownItemSet(name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| SpotError::UnknownItemSet(name.to_string()))?;
        let set: ItemSet = serde_json::from_str(contents)?;
        set.validated()
    }

    pub fn from_labels(name: &str, items: Vec<String>) -> Result<Self> {
        ItemSet {
            name: name.to_string(),
            items,
        }
        .validated()
    }

    /// Names of the embedded sets, sorted.
    pub fn available() -> Vec<String> {
        ITEM_SET_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .filter_map(|s| s.to_str())
            .map(str::to_string)
            .sorted()
            .collect()
    }

    pub fn label(&self, index: ItemIndex) -> &str {
        self.items.get(index).map(String::as_str).unwrap_or("?")
    }

    fn validated(self) -> Result<Self> {
        if self.items.len() != ITEM_COUNT {
            return Err(SpotError::ItemSetSize {
                name: self.name,
                expected: ITEM_COUNT,
                found: self.items.len(),
            });
        }
        Ok(self)
    }
}
