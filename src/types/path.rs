use std::fmt;

/// One step from a YAML node to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Location of a node inside a rule program, as the sequence of mapping keys
/// and sequence indices leading to it from the program root.
///
/// Renders as `risk.for.do[1].if.cond`; the root renders as `<root>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YamlPath(Vec<PathSegment>);

impl YamlPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Key(key.into()));
        Self(segments)
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for YamlPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{key}")?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_root() {
        assert_eq!(YamlPath::root().to_string(), "<root>");
    }

    #[test]
    fn display_mixed_segments() {
        let path = YamlPath::root()
            .key("risk")
            .index(0)
            .key("for")
            .key("do")
            .index(2)
            .key("if");
        assert_eq!(path.to_string(), "risk[0].for.do[2].if");
    }

    #[test]
    fn leading_index() {
        let path = YamlPath::root().index(3).key("let");
        assert_eq!(path.to_string(), "[3].let");
    }

    #[test]
    fn children_do_not_alias_parent() {
        let parent = YamlPath::root().key("a");
        let child = parent.key("b");
        assert_eq!(parent.segments().len(), 1);
        assert_eq!(child.segments().len(), 2);
    }
}
