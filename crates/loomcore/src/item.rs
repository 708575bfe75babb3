use crate::value::{get_path, JsonObject, Value};
use serde::{Deserialize, Serialize};

/// Key used when a behavior has to carry a bare scalar as an item payload.
pub const SCALAR_KEY: &str = "data";

/// The unit of data flowing along an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub json: JsonObject,
    #[serde(default)]
    pub paired_item: PairedItem,
}

/// Index of the item in the producing node's input set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedItem {
    pub item: usize,
}

impl Item {
    pub fn new(json: JsonObject, paired: usize) -> Self {
        Self {
            json,
            paired_item: PairedItem { item: paired },
        }
    }

    /// The `{json: {}}` item a trigger is invoked with.
    pub fn seed() -> Self {
        Self::new(JsonObject::new(), 0)
    }

    /// Build an item from any JSON value, wrapping scalars and arrays under
    /// [`SCALAR_KEY`] so the payload stays keyed.
    pub fn from_value(value: Value, paired: usize) -> Self {
        match value {
            Value::Object(json) => Self::new(json, paired),
            other => {
                let mut json = JsonObject::new();
                json.insert(SCALAR_KEY.to_string(), other);
                Self::new(json, paired)
            }
        }
    }

    /// Dot-notation lookup into the payload.
    pub fn get(&self, path: &str) -> Option<&Value> {
        get_path(&self.json, path)
    }

    pub fn paired(&self) -> usize {
        self.paired_item.item
    }
}
