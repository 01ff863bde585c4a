use crate::node::Facet;

/// Severity of a [`Note`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteStyle {
    Info,
    Warn,
    Error,
}

impl NoteStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteStyle::Info => "info",
            NoteStyle::Warn => "warn",
            NoteStyle::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub value: String,
    pub style: NoteStyle,
}

/// Diagnostics recorded during conversion, such as plugin failures.
///
/// Contributes no edges. Unlike the node's free-text note, any number of
/// entries may accumulate here.
#[derive(Debug, Clone, Default)]
pub struct NoteFacet {
    notes: Vec<Note>,
}

impl NoteFacet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Into<String>, style: NoteStyle) {
        self.notes.push(Note {
            value: value.into(),
            style,
        });
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn errors(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter().filter(|n| n.style == NoteStyle::Error)
    }
}

impl Facet for NoteFacet {
    fn name(&self) -> &'static str {
        "NoteFacet"
    }

    crate::facet_any!();
}
