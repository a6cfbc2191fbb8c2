use std::sync::Arc;

use regex::Regex;

/// Upper bound on full passes of the chain
const MAX_PASSES: usize = 16;

/// A pure description clean-up step
pub type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Ordered chain of description transforms. Later steps see the output of
/// earlier ones.
#[derive(Clone)]
pub struct Sanitizer {
    transforms: Vec<Transform>,
}

impl Sanitizer {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self { transforms }
    }

    /// Standard chain: remove boilerplate strings, then raw image markup
    pub fn standard(boilerplate: &[String]) -> Self {
        Self::new(vec![strip_boilerplate(boilerplate.to_vec()), strip_images()])
    }

    /// Run the chain until the text stops changing, so a removal in one
    /// step that exposes work for another is also cleaned up
    pub fn apply(&self, text: &str) -> String {
        let mut out = self.apply_once(text);
        for _ in 1..MAX_PASSES {
            let next = self.apply_once(&out);
            if next == out {
                break;
            }
            out = next;
        }
        out
    }

    fn apply_once(&self, text: &str) -> String {
        self.transforms
            .iter()
            .fold(text.to_string(), |acc, transform| transform(&acc))
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::standard(&[])
    }
}

/// Remove every occurrence of each boilerplate string, repeating until none
/// remain so removals that join two halves of a phrase are also cleaned
pub fn strip_boilerplate(phrases: Vec<String>) -> Transform {
    let phrases: Vec<String> = phrases.into_iter().filter(|p| !p.is_empty()).collect();
    Arc::new(move |text: &str| {
        let mut out = text.to_string();
        loop {
            let before = out.len();
            for phrase in &phrases {
                out = out.replace(phrase.as_str(), "");
            }
            if out.len() == before {
                return out;
            }
        }
    })
}

/// Remove `<img ...>` tags
pub fn strip_images() -> Transform {
    let pattern = Regex::new(r"(?is)<img\b[^>]*>").expect("image pattern is a valid regex");
    Arc::new(move |text: &str| pattern.replace_all(text, "").into_owned())
}
