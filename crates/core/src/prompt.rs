//! Prompt composition for catalog product images.

use serde::Serialize;

use crate::translation::{resolve, TranslationTable};
use crate::types::ItemRecord;

/// Leading style tag for every positive prompt (line-art product sheet look).
pub const STYLE_TAG: &str = "line art illustration, clean lines, simple shading";

/// Item-independent negative prompt.
pub const NEGATIVE_PROMPT: &str = "photorealistic, photo, photography, 3d render, realistic, \
detailed texture, intricate details, complex lighting, shadows, messy lines, sketch, painting, \
blurry, low quality, text, words, person, model, hands, feet, extra objects, deformed, labels, logos";

/// Positive and negative prompt text for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptPair {
    pub positive: String,
    pub negative: String,
}

/// Compose the prompts for `item`, resolving its keys to English terms.
pub fn build_prompts(item: &ItemRecord, translations: Option<&TranslationTable>) -> PromptPair {
    let color = resolve(
        &format!("color.{}", item.color_name),
        translations,
        &item.color_name,
    );
    let name = resolve(&item.name_key, translations, &item.name_key);
    let style = resolve(&item.style_key, translations, &item.style_key);

    PromptPair {
        positive: format!(
            "{STYLE_TAG}, {color} {name} ({style}), front view, plain white background, no model, no other objects."
        ),
        negative: NEGATIVE_PROMPT.to_string(),
    }
}
