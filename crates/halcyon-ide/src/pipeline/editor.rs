/// Source of the text the pipeline compiles
///
/// The pipeline reads the text by value when an action starts; later edits
/// do not affect an action already in progress.
pub trait Editor {
    fn text(&self) -> String;
}

/// In-memory editor contents
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBuffer {
    text: String,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }
}

impl Editor for TextBuffer {
    fn text(&self) -> String {
        self.text.clone()
    }
}
