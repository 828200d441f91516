use std::{fmt, ops::Deref, str::FromStr};

use parse_display::Display;

use crate::Value;


/// One step of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Display)]
pub enum PathSegment {
    #[display("{0}")]
    Key(String),
    #[display("{0}")]
    Index(usize),
}

impl PathSegment {
    /// Classifies a dotted-path part: numeric if the whole part parses as an index.
    pub fn parse(part: &str) -> Self {
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = part.parse() {
                return PathSegment::Index(index);
            }
        }
        PathSegment::Key(part.to_owned())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PathSegment::Index(_))
    }

    /// The key this segment uses when it addresses an object.
    pub fn to_key(&self) -> String {
        match self {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(index) => index.to_string(),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(value: &str) -> Self {
        PathSegment::Key(value.to_owned())
    }
}
impl From<usize> for PathSegment {
    fn from(value: usize) -> Self {
        PathSegment::Index(value)
    }
}

/// An ordered sequence of segments addressing a position in a value or tree.
///
/// Displayed and parsed in dotted form (`"items.2.name"`). The empty path is a sentinel that
/// every accessor treats as a no-op.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathSegment>);

impl Path {
    pub fn new(segments: Vec<PathSegment>) -> Self {
        Self(segments)
    }

    /// Splits a dotted string into segments.
    ///
    /// The empty string yields the empty path.
    pub fn parse(path: &str) -> Self {
        if path.is_empty() {
            return Self::default();
        }
        Self(path.split('.').map(PathSegment::parse).collect())
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }
    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    /// Returns a path extended by one segment.
    pub fn join(&self, segment: impl Into<PathSegment>) -> Self {
        let mut path = self.clone();
        path.push(segment.into());
        path
    }

    /// Splits into the parent path and the final segment.
    pub fn split_last(&self) -> Option<(Path, &PathSegment)> {
        let (last, parent) = self.0.split_last()?;
        Some((Path(parent.to_vec()), last))
    }
}

impl Deref for Path {
    type Target = [PathSegment];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
impl From<&str> for Path {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}
impl From<&String> for Path {
    fn from(value: &String) -> Self {
        Self::parse(value)
    }
}
impl From<&Path> for Path {
    fn from(value: &Path) -> Self {
        value.clone()
    }
}
impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Splits a dotted string into segments.
pub fn parse(path: &str) -> Path {
    Path::parse(path)
}

/// Reads the value at `path` from a plain value.
///
/// Returns `None` for the empty path, for a nullish root, and whenever a step does not land on a
/// container holding that key or index.
pub fn get<'a>(root: &'a Value, path: impl Into<Path>) -> Option<&'a Value> {
    let path = path.into();
    if path.is_empty() || root.is_nullish() {
        return None;
    }
    let mut value = root;
    for segment in path.iter() {
        value = value.child(segment)?;
    }
    Some(value)
}
