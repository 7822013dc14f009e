//! In-memory UPPAAL network: global declarations, templates and the system block.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LocationId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LocationKind {
    Normal,
    Urgent,
    Committed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
}

/// A guarded, synchronised edge between two locations of one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub source: LocationId,
    pub target: LocationId,
    pub select: Option<String>,
    pub guard: Option<String>,
    pub sync: Option<String>,
    pub update: Option<String>,
}

impl Transition {
    pub fn new(source: LocationId, target: LocationId) -> Self {
        Self {
            source,
            target,
            select: None,
            guard: None,
            sync: None,
            update: None,
        }
    }

    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = non_empty(select.into());
        self
    }

    pub fn guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = non_empty(guard.into());
        self
    }

    pub fn sync(mut self, sync: impl Into<String>) -> Self {
        self.sync = non_empty(sync.into());
        self
    }

    /// Assignments are joined with `, ` as UPPAAL expects.
    pub fn update<I, S>(mut self, assignments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let joined: Vec<String> = assignments
            .into_iter()
            .map(Into::into)
            .filter(|s| !s.is_empty())
            .collect();
        self.update = non_empty(joined.join(", "));
        self
    }
}

fn non_empty(s: String) -> Option<String> {
    (!s.trim().is_empty()).then_some(s)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Template {
    pub name: String,
    /// Local declarations: variables, arrays and helper functions.
    pub declaration: String,
    pub locations: Vec<Location>,
    pub initial: LocationId,
    pub transitions: Vec<Transition>,
}

impl Template {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declaration: String::new(),
            locations: Vec::new(),
            initial: LocationId(0),
            transitions: Vec::new(),
        }
    }

    pub fn add_location(&mut self, name: impl Into<String>, kind: LocationKind) -> LocationId {
        let id = LocationId(self.locations.len());
        self.locations.push(Location {
            id,
            name: name.into(),
            kind,
        });
        id
    }

    pub fn set_initial(&mut self, id: LocationId) {
        self.initial = id;
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    pub fn location_name(&self, id: LocationId) -> &str {
        self.locations
            .get(id.0)
            .map(|l| l.name.as_str())
            .unwrap_or_default()
    }

    /// Transitions between the locations named `source` and `target`.
    pub fn transitions_between<'a>(
        &'a self,
        source: &'a str,
        target: &'a str,
    ) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| {
            self.location_name(t.source) == source && self.location_name(t.target) == target
        })
    }

    pub fn transitions_from<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions
            .iter()
            .filter(move |t| self.location_name(t.source) == source)
    }
}

/// A complete model ready for export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub global_declaration: String,
    pub templates: Vec<Template>,
    pub system_block: String,
}

impl Network {
    pub fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }
}
