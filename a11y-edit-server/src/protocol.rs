use a11y_edit::{Capability, ConstructionLocation, EditRequest, ElementId};
use serde::{Deserialize, Serialize};

/// One JSON line from the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    RegisterComponent {
        session: String,
        node_id: u64,
        component_type: String,
        /// Omitted when the runtime does not know; the configured catalog applies
        #[serde(default)]
        capabilities: Option<Vec<Capability>>,
        #[serde(default)]
        location: Option<ConstructionLocation>,
    },
    SetCurrentView {
        session: String,
        node_id: u64,
    },
    SetLabel {
        session: String,
        node_id: u64,
        label: String,
    },
    SetAriaLabel {
        session: String,
        node_id: u64,
        label: String,
    },
    SetTitle {
        session: String,
        node_id: u64,
        title: String,
    },
    SetAltText {
        session: String,
        node_id: u64,
        text: String,
    },
    UpdatePageTitle {
        session: String,
        label: String,
    },
    UpdateRouteExtends {
        session: String,
    },
    /// Where the component behind `node_id` was created
    ShowLocation {
        session: String,
        node_id: u64,
    },
    /// Where the current view was created
    ShowRoute {
        session: String,
    },
    CloseSession {
        session: String,
    },
}

impl Request {
    pub fn session(&self) -> &str {
        match self {
            Request::RegisterComponent { session, .. }
            | Request::SetCurrentView { session, .. }
            | Request::SetLabel { session, .. }
            | Request::SetAriaLabel { session, .. }
            | Request::SetTitle { session, .. }
            | Request::SetAltText { session, .. }
            | Request::UpdatePageTitle { session, .. }
            | Request::UpdateRouteExtends { session }
            | Request::ShowLocation { session, .. }
            | Request::ShowRoute { session }
            | Request::CloseSession { session } => session,
        }
    }

    /// The source edit this request asks for, if it is one.
    pub fn edit(&self) -> Option<EditRequest> {
        let edit = match self {
            Request::SetLabel { node_id, label, .. } => EditRequest::SetLabel {
                element: ElementId(*node_id),
                text: label.clone(),
            },
            Request::SetAriaLabel { node_id, label, .. } => EditRequest::SetAriaLabel {
                element: ElementId(*node_id),
                text: label.clone(),
            },
            Request::SetTitle { node_id, title, .. } => EditRequest::SetTitle {
                element: ElementId(*node_id),
                text: title.clone(),
            },
            Request::SetAltText { node_id, text, .. } => EditRequest::SetAltText {
                element: ElementId(*node_id),
                text: text.clone(),
            },
            Request::UpdatePageTitle { label, .. } => EditRequest::SetPageTitle {
                text: label.clone(),
            },
            Request::UpdateRouteExtends { .. } => EditRequest::PromoteToMainRole,
            Request::RegisterComponent { .. }
            | Request::SetCurrentView { .. }
            | Request::ShowLocation { .. }
            | Request::ShowRoute { .. }
            | Request::CloseSession { .. } => return None,
        };
        Some(edit)
    }

    /// The creation site this request asks to show, if it is a lookup.
    pub fn lookup(&self) -> Option<Lookup> {
        match self {
            Request::ShowLocation { node_id, .. } => Some(Lookup::Element(ElementId(*node_id))),
            Request::ShowRoute { .. } => Some(Lookup::CurrentView),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Element(ElementId),
    CurrentView,
}

/// One JSON line to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    Success {
        session: Option<String>,
        message: String,
    },
    Error {
        session: Option<String>,
        message: String,
    },
}

impl Notification {
    pub fn success(session: &str, message: impl Into<String>) -> Self {
        Notification::Success {
            session: Some(session.to_string()),
            message: message.into(),
        }
    }

    pub fn error(session: Option<&str>, message: impl Into<String>) -> Self {
        Notification::Error {
            session: session.map(String::from),
            message: message.into(),
        }
    }
}
