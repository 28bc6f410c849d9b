//! The catalog item: a crafting recipe and its decoding from remote records.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::remote::RemoteRecord;

/// Number of slots in a crafting grid.
pub const GRID_SLOTS: usize = 9;

/// Maximum number of alternate ingredient grids and alternate outputs.
pub const MAX_ALTERNATES: usize = 4;

/// A 3x3 crafting grid in row-major order. Empty string = empty slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IngredientGrid([String; GRID_SLOTS]);

impl IngredientGrid {
    /// Build a grid from a slot list, padding short lists with empty slots.
    /// Slots past the ninth are dropped.
    pub fn from_slots(slots: &[String]) -> Self {
        let mut grid: [String; GRID_SLOTS] = Default::default();
        for (slot, value) in grid.iter_mut().zip(slots) {
            *slot = value.clone();
        }
        Self(grid)
    }

    pub fn slots(&self) -> &[String] {
        &self.0
    }

    /// Distinct non-empty ingredient names, first-seen order.
    pub fn ingredient_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for slot in self.0.iter().filter(|s| !s.is_empty()) {
            if !names.contains(&slot.as_str()) {
                names.push(slot);
            }
        }
        names
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub ingredients: IngredientGrid,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_ingredients: Vec<IngredientGrid>,
    pub output: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_outputs: Vec<u32>,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_remark: Option<String>,
}

impl Recipe {
    /// Every ingredient used by the primary grid or any alternate.
    pub fn all_ingredient_names(&self) -> Vec<&str> {
        let mut names = self.ingredients.ingredient_names();
        for grid in &self.alternate_ingredients {
            for name in grid.ingredient_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }
}

/// Record names are numeric ids; anything else maps to 0.
pub fn parse_record_id(record_name: &str) -> i64 {
    record_name.trim().parse().unwrap_or(0)
}

fn required_string(record: &RemoteRecord, field: &'static str) -> Result<String, DecodeError> {
    record
        .string(field)
        .map(str::to_string)
        .ok_or_else(|| DecodeError::MissingField {
            record: record.record_name.clone(),
            field,
        })
}

fn quantity(record: &RemoteRecord, field: &str, value: i64) -> Result<u32, DecodeError> {
    u32::try_from(value).map_err(|_| DecodeError::InvalidField {
        record: record.record_name.clone(),
        field: field.to_string(),
        reason: format!("{value} is not a valid quantity"),
    })
}

impl TryFrom<&RemoteRecord> for Recipe {
    type Error = DecodeError;

    fn try_from(record: &RemoteRecord) -> Result<Self, Self::Error> {
        let name = required_string(record, "name")?;
        let image = required_string(record, "image")?;
        let category = required_string(record, "category")?;

        let ingredients = record
            .string_list("ingredients")
            .map(IngredientGrid::from_slots)
            .ok_or_else(|| DecodeError::MissingField {
                record: record.record_name.clone(),
                field: "ingredients",
            })?;

        let output = record.int("output").ok_or_else(|| DecodeError::MissingField {
            record: record.record_name.clone(),
            field: "output",
        })?;
        let output = quantity(record, "output", output)?;

        let mut alternate_ingredients = Vec::new();
        let mut alternate_outputs = Vec::new();
        for n in 1..=MAX_ALTERNATES {
            if let Some(slots) = record.string_list(&format!("alternateIngredients{n}")) {
                alternate_ingredients.push(IngredientGrid::from_slots(slots));
            }
            let field = format!("alternateOutput{n}");
            if let Some(value) = record.int(&field) {
                alternate_outputs.push(quantity(record, &field, value)?);
            }
        }

        Ok(Recipe {
            id: parse_record_id(&record.record_name),
            name,
            image,
            ingredients,
            alternate_ingredients,
            output,
            alternate_outputs,
            category,
            remarks: record.string("remarks").map(str::to_string),
            image_remark: record.string("imageremark").map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torch_record() -> RemoteRecord {
        RemoteRecord::new("12")
            .with_field("name", "Torch")
            .with_field("image", "torch.png")
            .with_field("ingredients", vec!["", "", "", "", "Coal", "", "", "Stick", ""])
            .with_field("output", 4i64)
            .with_field("category", "Lighting")
    }

    #[test]
    fn test_decode_required_fields() {
        let recipe = Recipe::try_from(&torch_record()).unwrap();

        assert_eq!(recipe.id, 12);
        assert_eq!(recipe.name, "Torch");
        assert_eq!(recipe.image, "torch.png");
        assert_eq!(recipe.output, 4);
        assert_eq!(recipe.category, "Lighting");
        assert_eq!(recipe.ingredients.slots()[4], "Coal");
        assert_eq!(recipe.ingredients.ingredient_names(), vec!["Coal", "Stick"]);
        assert!(recipe.alternate_ingredients.is_empty());
        assert!(recipe.remarks.is_none());
        assert!(recipe.image_remark.is_none());
    }

    #[test]
    fn test_decode_optional_fields() {
        let record = torch_record()
            .with_field("remarks", "Place on walls")
            .with_field("imageremark", "Shown lit")
            .with_field("alternateIngredients1", vec!["", "", "", "", "Charcoal", "", "", "Stick", ""])
            .with_field("alternateOutput1", 4i64)
            .with_field("alternateOutput3", 8i64);

        let recipe = Recipe::try_from(&record).unwrap();

        assert_eq!(recipe.remarks.as_deref(), Some("Place on walls"));
        assert_eq!(recipe.image_remark.as_deref(), Some("Shown lit"));
        assert_eq!(recipe.alternate_ingredients.len(), 1);
        assert_eq!(recipe.alternate_outputs, vec![4, 8]);
        assert_eq!(recipe.all_ingredient_names(), vec!["Coal", "Stick", "Charcoal"]);
    }

    #[test]
    fn test_decode_missing_field() {
        let mut record = torch_record();
        record.fields.remove("category");

        let err = Recipe::try_from(&record).unwrap_err();
        assert_eq!(
            err,
            DecodeError::MissingField {
                record: "12".to_string(),
                field: "category"
            }
        );
    }

    #[test]
    fn test_decode_negative_output_is_invalid() {
        let record = torch_record().with_field("output", -1i64);
        assert!(matches!(
            Recipe::try_from(&record),
            Err(DecodeError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_unparsable_record_name_maps_to_zero() {
        assert_eq!(parse_record_id("42"), 42);
        assert_eq!(parse_record_id(" 7 "), 7);
        assert_eq!(parse_record_id("torch-recipe"), 0);

        let mut record = torch_record();
        record.record_name = "A1B2-C3".to_string();
        assert_eq!(Recipe::try_from(&record).unwrap().id, 0);
    }

    #[test]
    fn test_grid_pads_and_truncates() {
        let short = IngredientGrid::from_slots(&["Planks".to_string()]);
        assert_eq!(short.slots().len(), GRID_SLOTS);
        assert_eq!(short.slots()[0], "Planks");
        assert!(short.slots()[1..].iter().all(|s| s.is_empty()));

        let long: Vec<String> = (0..12).map(|i| format!("item{i}")).collect();
        let grid = IngredientGrid::from_slots(&long);
        assert_eq!(grid.slots().len(), GRID_SLOTS);
        assert_eq!(grid.slots()[8], "item8");

        assert!(IngredientGrid::default().ingredient_names().is_empty());
    }

    #[test]
    fn test_cache_json_shape() {
        let recipe = Recipe::try_from(&torch_record().with_field("imageremark", "lit")).unwrap();
        let json = serde_json::to_string(&recipe).unwrap();

        assert!(json.contains("\"imageRemark\":\"lit\""));
        assert!(json.contains("\"ingredients\":[\"\",\"\",\"\",\"\",\"Coal\""));
        // Empty optional collections are omitted
        assert!(!json.contains("alternateIngredients"));
        assert!(!json.contains("remarks"));

        let decoded: Recipe = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, recipe);
    }
}
