use crate::source::{WorkItem, WorkUnit};

const WORD: &str = "{word}";
const TRANSLATION: &str = "{translation}";
const ITEMS: &str = "{items}";

/// User prompt with `{word}`, `{translation}` and `{items}` placeholders.
///
/// `{word}` and `{translation}` take the unit's first item; `{items}` is the
/// whole unit as a JSON array of `{"word", "translation"}` objects.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn references_items(&self) -> bool {
        self.references_unit() || self.template.contains(WORD) || self.template.contains(TRANSLATION)
    }

    /// Whether the template can describe more than one item.
    pub fn references_unit(&self) -> bool {
        self.template.contains(ITEMS)
    }

    pub fn render(&self, unit: &WorkUnit) -> String {
        let first = unit.first();
        let mut rendered = self
            .template
            .replace(WORD, &first.word)
            .replace(TRANSLATION, &first.translation);
        if self.references_unit() {
            rendered = rendered.replace(ITEMS, &items_json(unit.items()));
        }
        rendered
    }
}

fn items_json(items: &[WorkItem]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
