//! Explicit session context.
//!
//! The engine never looks up "the current session" on its own: every operation
//! receives a [`SessionContext`] that answers the collaborator questions (which
//! component is this element, where was it built, where are its sources) and
//! owns the tracked locations the engine refreshes after a successful edit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;

use crate::location::{ConstructionLocation, LineRemap, LocationTable, SourceFile};

/// What a component can carry. Edits are gated on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Label,
    AriaLabel,
    ImageAlt,
    Element,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Label => "labels",
            Capability::AriaLabel => "aria labels",
            Capability::ImageAlt => "image alt text",
            Capability::Element => "element attributes",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

/// Runtime identifier of a UI element (a node id in the UI tree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A live component as the UI tree reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeComponent {
    pub id: ElementId,
    /// Component type, e.g. `TextField` or `ui::html::Image`
    pub component_type: String,
    pub capabilities: BTreeSet<Capability>,
}

impl RuntimeComponent {
    pub fn new(
        id: ElementId,
        component_type: impl Into<String>,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            id,
            component_type: component_type.into(),
            capabilities: capabilities.into_iter().collect(),
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Everything the engine needs from its surroundings for one session.
pub trait SessionContext {
    fn session_id(&self) -> &SessionId;

    /// UI tree lookup.
    fn resolve_element(&self, element: ElementId) -> Option<RuntimeComponent>;

    /// The view currently shown in this session.
    fn current_view(&self) -> Option<RuntimeComponent>;

    /// Creation tracker lookup.
    fn construction_site(&self, component: &RuntimeComponent) -> Option<ConstructionLocation>;

    /// Source root holding `type_name`.
    fn source_root_for(&self, type_name: &str) -> PathBuf;

    /// Shift tracked locations after a successful edit.
    fn apply_remap(&mut self, remap: &LineRemap);

    fn source_file(&self, location: &ConstructionLocation) -> PathBuf {
        SourceFile::resolve(&self.source_root_for(&location.type_name), location)
    }
}

/// In-memory session: a component registry, the current view and the
/// construction locations reported by the running UI.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    source_root: PathBuf,
    components: HashMap<ElementId, RuntimeComponent>,
    locations: LocationTable<ElementId>,
    current_view: Option<ElementId>,
}

impl Session {
    pub fn new(id: impl Into<SessionId>, source_root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            source_root: source_root.into(),
            components: HashMap::new(),
            locations: LocationTable::new(),
            current_view: None,
        }
    }

    /// Register (or re-register) a component and, if known, where it was built.
    pub fn register(&mut self, component: RuntimeComponent, location: Option<ConstructionLocation>) {
        let id = component.id;
        self.components.insert(id, component);
        match location {
            Some(location) => {
                self.locations.insert(id, location);
            }
            None => {
                self.locations.remove(&id);
            }
        }
    }

    pub fn set_current_view(&mut self, element: ElementId) {
        self.current_view = Some(element);
    }

    pub fn location_of(&self, element: ElementId) -> Option<&ConstructionLocation> {
        self.locations.get(&element)
    }
}

impl SessionContext for Session {
    fn session_id(&self) -> &SessionId {
        &self.id
    }

    fn resolve_element(&self, element: ElementId) -> Option<RuntimeComponent> {
        self.components.get(&element).cloned()
    }

    fn current_view(&self) -> Option<RuntimeComponent> {
        self.current_view.and_then(|id| self.components.get(&id).cloned())
    }

    fn construction_site(&self, component: &RuntimeComponent) -> Option<ConstructionLocation> {
        self.locations.get(&component.id).cloned()
    }

    fn source_root_for(&self, _type_name: &str) -> PathBuf {
        self.source_root.clone()
    }

    fn apply_remap(&mut self, remap: &LineRemap) {
        let root = self.source_root.clone();
        self.locations
            .apply(remap, |location| SourceFile::resolve(&root, location));
    }
}
