use crate::models::{LooseValue, Product, ReferencePicture};
use crate::services::image_loader::EncodedImage;

/// Identical for every request, so providers can cache it as a system prompt
pub const INSTRUCTION: &str = "You are an expert food measurement system. You analyze meal photos \
to estimate the weight of each food item on the plate.

Your task:
1. Compare the photo taken BEFORE the meal with the photo taken AFTER the meal.
2. Use the reference photos of each product, taken at a known weight on a plate of known size, \
to estimate how much of each product was on the plate before and after the meal.
3. Work out how much of each product was consumed.

Guidelines:
- Use the plate dimensions and visual cues (volume, surface covered, height) to judge portion sizes.
- Your estimates should add up to the declared total weight of the meal before eating.
- Give every measurement in grams.
- Give confidence as an integer from 1 (guess) to 100 (certain).

Respond with a single JSON object and nothing else, using exactly this structure:
{
  \"total_estimated_weight_before\": number,
  \"total_estimated_weight_after\": number,
  \"total_estimated_consumed\": number,
  \"products_analysis\": [
    {
      \"sku\": \"string\",
      \"name\": \"string\",
      \"estimated_weight_before\": number,
      \"estimated_weight_after\": number,
      \"estimated_consumed\": number,
      \"confidence\": integer
    }
  ],
  \"notes\": \"string (optional)\"
}";

const NO_DESCRIPTION: &str = "No description provided";

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Image(EncodedImage),
}

/// Instruction message plus the per-request data message
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub instruction: String,
    pub data: Vec<ContentPart>,
}

impl Prompt {
    pub fn image_count(&self) -> usize {
        self.data
            .iter()
            .filter(|part| matches!(part, ContentPart::Image(_)))
            .count()
    }

    /// Text of the data message with images left out
    pub fn data_text(&self) -> String {
        self.data
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Clone)]
pub struct PreparedPicture<'a> {
    pub picture: &'a ReferencePicture,
    pub image: EncodedImage,
}

#[derive(Debug, Clone)]
pub struct PreparedProduct<'a> {
    pub product: &'a Product,
    pub pictures: Vec<PreparedPicture<'a>>,
}

/// Meal data with every image already loaded
#[derive(Debug, Clone)]
pub struct PromptInput<'a> {
    pub weight_before: f64,
    pub description: Option<&'a str>,
    pub picture_before: EncodedImage,
    pub picture_after: EncodedImage,
    pub products: Vec<PreparedProduct<'a>>,
}

/// Accumulates text and merges it between images
struct PartsWriter {
    parts: Vec<ContentPart>,
    text: String,
}

impl PartsWriter {
    fn new() -> Self {
        Self {
            parts: Vec::new(),
            text: String::new(),
        }
    }

    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn image(&mut self, image: &EncodedImage) {
        self.flush();
        self.parts.push(ContentPart::Image(image.clone()));
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.parts.push(ContentPart::Text(std::mem::take(&mut self.text)));
        }
    }

    fn finish(mut self) -> Vec<ContentPart> {
        self.flush();
        self.parts
    }
}

/// Appends `unit` unless the client already wrote one ("24 cm")
fn with_unit(value: &LooseValue, unit: &str) -> String {
    match value {
        LooseValue::Numeric(_) => format!("{}{}", value, unit),
        LooseValue::Text(text) if text.trim().ends_with(|c: char| c.is_alphabetic()) => {
            value.to_string()
        }
        LooseValue::Text(_) => format!("{}{}", value, unit),
        LooseValue::Absent => value.to_string(),
    }
}

pub fn build_prompt(input: &PromptInput<'_>) -> Prompt {
    let mut writer = PartsWriter::new();

    let description = input
        .description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(NO_DESCRIPTION);

    writer.line("## Meal Information");
    writer.line(&format!("- Description: {}", description));
    writer.line(&format!("- Total weight before: {}g", input.weight_before));
    writer.line("");
    writer.line("## Meal Images");
    writer.line("Before meal image:");
    writer.image(&input.picture_before);
    writer.line("After meal image:");
    writer.image(&input.picture_after);
    writer.line("");
    writer.line("## Products to Analyze");

    for prepared in &input.products {
        let product = prepared.product;
        writer.line(&format!("### {} (SKU: {})", product.name, product.sku));

        for reference in &prepared.pictures {
            let picture = reference.picture;
            writer.line(&format!(
                "Reference image (weight: {}, plate ID: {}):",
                with_unit(&picture.weight, "g"),
                picture.plate_id
            ));
            writer.image(&reference.image);
            writer.line(&format!(
                "Plate dimensions: upper diameter: {}, lower diameter: {}, depth: {}",
                with_unit(&picture.upper_diameter, "cm"),
                with_unit(&picture.lower_diameter, "cm"),
                with_unit(&picture.depth, "cm")
            ));
        }
        writer.line("");
    }

    writer.line("");
    writer.line(
        "Analyze the images and estimate the weight of each product before and after the meal.",
    );
    writer.line("Return your response in the JSON structure specified above.");

    Prompt {
        instruction: INSTRUCTION.to_string(),
        data: writer.finish(),
    }
}
