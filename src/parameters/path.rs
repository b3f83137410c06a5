// Route templates for RESTful path parameters
//
// A template such as `/users/:id/posts/:postId` matches a path with the same
// number of segments whose literal segments are equal; every `:name` segment
// is a wildcard and becomes a path parameter.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    raw: String,
    segments: Vec<Segment>,
}

/// A wildcard bound to a concrete path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    pub name: String,
    pub value: String,
    /// Index into `path.split('/')`.
    pub index: usize,
}

impl PathTemplate {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => Segment::Wildcard(name.to_string()),
                None => Segment::Literal(segment.to_string()),
            })
            .collect();
        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Bind the wildcards against `path`, or `None` if the shape differs.
    pub fn match_path(&self, path: &str) -> Option<Vec<PathMatch>> {
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut matches = Vec::new();
        for (index, (segment, part)) in self.segments.iter().zip(&parts).enumerate() {
            match segment {
                Segment::Literal(literal) if literal != part => return None,
                Segment::Literal(_) => {}
                Segment::Wildcard(name) => matches.push(PathMatch {
                    name: name.clone(),
                    value: part.to_string(),
                    index,
                }),
            }
        }
        Some(matches)
    }

    /// Segment index of the wildcard called `name`.
    pub fn wildcard_index(&self, name: &str) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| matches!(segment, Segment::Wildcard(n) if n == name))
    }
}

/// First template in catalog order that matches `path`.
pub fn find_template<'a>(templates: &'a [PathTemplate], path: &str) -> Option<(&'a PathTemplate, Vec<PathMatch>)> {
    templates
        .iter()
        .find_map(|template| template.match_path(path).map(|matches| (template, matches)))
}
