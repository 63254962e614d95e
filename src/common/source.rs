/// A `Source` is a named handle on some program text.
///
/// `ember` does not track locations within the source, so this is little
/// more than a named wrapper around a `String` — but every pass entry point
/// takes a `Source` rather than a bare `&str`, so callers always have a
/// single, owned thing to pass down the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub contents: String,
}

impl Source {
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Source {
        Source {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Build a `Source` with no meaningful name, e.g. for tests and for
    /// reading from stdin.
    pub fn source(contents: impl Into<String>) -> Source {
        Source::new("<anonymous>", contents)
    }
}

impl From<String> for Source {
    fn from(contents: String) -> Source {
        Source::source(contents)
    }
}
