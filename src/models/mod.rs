mod analysis;

pub use analysis::{MealAnalysisResult, ProductAnalysis};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A request field that clients send as a number, as a string, or not at all
/// (plate geometry, declared picture weights)
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LooseValue {
    Numeric(f64),
    Text(String),
    #[default]
    Absent,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawLooseValue {
    Numeric(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for LooseValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = match Option::<RawLooseValue>::deserialize(deserializer)? {
            Some(RawLooseValue::Numeric(n)) => LooseValue::Numeric(n),
            // Empty strings arrive from form-backed clients and mean "not provided"
            Some(RawLooseValue::Text(s)) if s.trim().is_empty() => LooseValue::Absent,
            Some(RawLooseValue::Text(s)) => LooseValue::Text(s),
            None => LooseValue::Absent,
        };
        Ok(value)
    }
}

impl Serialize for LooseValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            LooseValue::Numeric(n) => serializer.serialize_f64(*n),
            LooseValue::Text(s) => serializer.serialize_str(s),
            LooseValue::Absent => serializer.serialize_none(),
        }
    }
}

/// Canonical text used when the value is interpolated into a prompt
impl fmt::Display for LooseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LooseValue::Numeric(n) => write!(f, "{}", n),
            LooseValue::Text(s) => write!(f, "{}", s.trim()),
            LooseValue::Absent => write!(f, "unknown"),
        }
    }
}

/// Photo of a product on a known plate at a known weight
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencePicture {
    pub id: i64,
    pub image_url: String,
    #[serde(default)]
    pub weight: LooseValue,
    #[serde(default)]
    pub plate_id: LooseValue,
    #[serde(default)]
    pub upper_diameter: LooseValue,
    #[serde(default)]
    pub lower_diameter: LooseValue,
    #[serde(default)]
    pub depth: LooseValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub pictures: Vec<ReferencePicture>,
    pub weight_in_req: f64,
}

/// One before/after observation of a meal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEvent {
    pub weight_before: f64,
    pub weight_after: f64,
    pub person_id: String,
    #[serde(default)]
    pub description: Option<String>,
    pub picture_before: String,
    pub picture_after: String,
    pub products: Vec<Product>,
}

/// Body of `POST /analyze-meal`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub meal_details: MealEvent,
    pub model_name: String,
}

impl AnalysisRequest {
    /// Checks what serde cannot express; returns the first violation
    pub fn validate(&self) -> Result<(), String> {
        if self.model_name.trim().is_empty() {
            return Err("model_name must not be empty".to_string());
        }

        let meal = &self.meal_details;
        if meal.picture_before.trim().is_empty() {
            return Err("meal_details.picture_before must not be empty".to_string());
        }
        if meal.picture_after.trim().is_empty() {
            return Err("meal_details.picture_after must not be empty".to_string());
        }
        if !meal.weight_before.is_finite() || !meal.weight_after.is_finite() {
            return Err("meal_details weights must be finite numbers".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loose_value_accepts_numbers_text_and_nulls() {
        let json = r#"{
            "id": 7,
            "imageUrl": "uploads\\products\\rice.jpg",
            "weight": 150,
            "plateId": "P-12",
            "upperDiameter": "24.5",
            "lowerDiameter": null,
            "depth": ""
        }"#;

        let picture: ReferencePicture = serde_json::from_str(json).unwrap();

        assert_eq!(picture.weight, LooseValue::Numeric(150.0));
        assert_eq!(picture.plate_id, LooseValue::Text("P-12".to_string()));
        assert_eq!(picture.upper_diameter, LooseValue::Text("24.5".to_string()));
        assert_eq!(picture.lower_diameter, LooseValue::Absent);
        assert_eq!(picture.depth, LooseValue::Absent);
    }

    #[test]
    fn test_missing_picture_fields_default_to_absent() {
        let picture: ReferencePicture =
            serde_json::from_str(r#"{"id": 1, "imageUrl": "a.jpg"}"#).unwrap();

        assert_eq!(picture.weight, LooseValue::Absent);
        assert_eq!(picture.depth, LooseValue::Absent);
    }

    #[test]
    fn test_loose_value_canonical_text() {
        assert_eq!(LooseValue::Numeric(500.0).to_string(), "500");
        assert_eq!(LooseValue::Numeric(12.5).to_string(), "12.5");
        assert_eq!(LooseValue::Text(" 3 ".to_string()).to_string(), "3");
        assert_eq!(LooseValue::Absent.to_string(), "unknown");
    }

    #[test]
    fn test_request_deserialization_with_optional_description() {
        let json = r#"{
            "meal_details": {
                "weight_before": 500,
                "weight_after": 300,
                "person_id": "p-1",
                "picture_before": "meals/before.jpg",
                "picture_after": "meals/after.jpg",
                "products": [
                    {"sku": "SKU-1", "name": "Rice", "weight_in_req": 200}
                ]
            },
            "model_name": "openai/gpt-4o"
        }"#;

        let request: AnalysisRequest = serde_json::from_str(json).unwrap();

        assert!(request.meal_details.description.is_none());
        assert!(request.meal_details.products[0].pictures.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_non_numeric_weight() {
        let json = r#"{
            "meal_details": {
                "weight_before": "heavy",
                "weight_after": 300,
                "person_id": "p-1",
                "picture_before": "b.jpg",
                "picture_after": "a.jpg",
                "products": []
            },
            "model_name": "m"
        }"#;

        assert!(serde_json::from_str::<AnalysisRequest>(json).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_model_name() {
        let request = AnalysisRequest {
            meal_details: MealEvent {
                weight_before: 500.0,
                weight_after: 300.0,
                person_id: "p-1".to_string(),
                description: None,
                picture_before: "b.jpg".to_string(),
                picture_after: "a.jpg".to_string(),
                products: vec![],
            },
            model_name: "  ".to_string(),
        };

        assert_eq!(request.validate().unwrap_err(), "model_name must not be empty");
    }
}
