#![forbid(unsafe_code)]

//! Query operation documents.
//!
//! A [`QueryDocument`] is the immutable description of one operation: a name
//! plus its source text. Documents are compared by value; the binding layer
//! replaces its live observable handle whenever the document changes, so
//! equality here is load-bearing.

use std::fmt;
use std::rc::Rc;

/// An immutable, cheaply clonable query operation document.
///
/// Cloning shares the underlying strings (`Rc<str>`), so documents can be
/// re-resolved every render without allocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDocument {
    name: Rc<str>,
    source: Rc<str>,
}

impl QueryDocument {
    /// Create a document from an operation name and its source text.
    #[must_use]
    pub fn new(name: &str, source: &str) -> Self {
        Self {
            name: Rc::from(name),
            source: Rc::from(source),
        }
    }

    /// The operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The operation source text.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for QueryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
