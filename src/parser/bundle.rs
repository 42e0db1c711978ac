use std::collections::BTreeMap;

use image::RgbaImage;

use crate::layout::Field;
use crate::ocr::{FieldExtractor, TextField};

/// One captured field, either still raw or already resolved.
#[derive(Clone, Debug)]
pub enum Captured {
    Image(RgbaImage),
    Text(String),
    Number(u32),
}

/// Raw captures for one item, promoted to values lazily.
///
/// The filter stage resolves only the fields it needs and leaves the
/// resolved value in place, so the parse stage never reads a field twice.
#[derive(Clone, Debug, Default)]
pub struct FieldBundle {
    fields: BTreeMap<Field, Captured>,
}

impl FieldBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&mut self, field: Field, image: RgbaImage) {
        self.fields.insert(field, Captured::Image(image));
    }

    pub fn set_number(&mut self, field: Field, value: u32) {
        self.fields.insert(field, Captured::Number(value));
    }

    pub fn get(&self, field: Field) -> Option<&Captured> {
        self.fields.get(&field)
    }

    pub fn image(&self, field: Field) -> Option<&RgbaImage> {
        match self.fields.get(&field) {
            Some(Captured::Image(img)) => Some(img),
            _ => None,
        }
    }

    pub fn number(&self, field: Field) -> Option<u32> {
        match self.fields.get(&field) {
            Some(Captured::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// True once the field holds a value instead of an image.
    pub fn is_resolved(&self, field: Field) -> bool {
        matches!(
            self.fields.get(&field),
            Some(Captured::Text(_) | Captured::Number(_))
        )
    }

    /// Returns the field's text, running OCR on first access. A missing
    /// field reads as empty.
    pub fn resolve_text(&mut self, field: Field, as_text: TextField, extractor: &FieldExtractor) -> String {
        let text = match self.fields.get(&field) {
            Some(Captured::Text(text)) => return text.clone(),
            Some(Captured::Number(n)) => return n.to_string(),
            Some(Captured::Image(img)) => extractor.extract(as_text, img),
            None => return String::new(),
        };
        self.fields.insert(field, Captured::Text(text.clone()));
        text
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{OcrEngine, PageSegMode};
    use image::DynamicImage;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting(AtomicUsize);

    impl OcrEngine for Counting {
        fn recognize(&self, _: &DynamicImage, _: &str, _: PageSegMode) -> anyhow::Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("20/40".to_string())
        }
    }

    #[test]
    fn test_resolve_text_caches_result() {
        let engine = Arc::new(Counting(AtomicUsize::new(0)));
        let extractor = FieldExtractor::new(engine.clone());
        let mut bundle = FieldBundle::new();
        bundle.insert_image(Field::Level, RgbaImage::new(4, 4));

        assert!(!bundle.is_resolved(Field::Level));
        assert_eq!(bundle.resolve_text(Field::Level, TextField::LightConeLevel, &extractor), "20/40");
        assert!(bundle.is_resolved(Field::Level));
        assert_eq!(bundle.resolve_text(Field::Level, TextField::LightConeLevel, &extractor), "20/40");
        assert_eq!(engine.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_and_numeric_fields() {
        let extractor = FieldExtractor::new(Arc::new(Counting(AtomicUsize::new(0))));
        let mut bundle = FieldBundle::new();
        assert_eq!(bundle.resolve_text(Field::Name, TextField::ItemName, &extractor), "");

        bundle.set_number(Field::Rarity, 5);
        assert_eq!(bundle.number(Field::Rarity), Some(5));
        assert!(bundle.image(Field::Rarity).is_none());
        assert_eq!(bundle.len(), 1);
    }
}
