//! The live edit engine.
//!
//! One request is one transaction: resolve the element, gate on its
//! capabilities, read and parse the file once, plan, render, write atomically,
//! then refresh the caller's tracked locations. Any error before the write
//! leaves both the file and the locations untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::error::{EditError, Result};
use crate::journal::{self, EditJournal, EditRecord};
use crate::location::{ConstructionLocation, LineRemap};
use crate::locate;
use crate::marker::{self, AttributeKind};
use crate::plan::{self, Modification};
use crate::session::{Capability, ElementId, RuntimeComponent, SessionContext};
use crate::surgical;
use crate::syntax::SyntaxTree;

/// A single edit, in tagged form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "kebab-case")]
pub enum EditRequest {
    SetLabel { element: ElementId, text: String },
    SetAriaLabel { element: ElementId, text: String },
    SetTitle { element: ElementId, text: String },
    SetAltText { element: ElementId, text: String },
    SetPageTitle { text: String },
    PromoteToMainRole,
}

impl EditRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            EditRequest::SetLabel { .. } => "set-label",
            EditRequest::SetAriaLabel { .. } => "set-aria-label",
            EditRequest::SetTitle { .. } => "set-title",
            EditRequest::SetAltText { .. } => "set-alt-text",
            EditRequest::SetPageTitle { .. } => "set-page-title",
            EditRequest::PromoteToMainRole => "promote-to-main-role",
        }
    }
}

/// Outcome of a successful request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditReport {
    pub path: PathBuf,
    /// False when the source already had the requested content
    pub changed: bool,
    pub line_delta: isize,
    pub remap: LineRemap,
    pub summary: String,
}

/// What the locator sees at one line, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub path: PathBuf,
    pub line: usize,
    pub anchor: String,
    pub receiver: Option<String>,
    pub implicit_receiver: Option<String>,
    /// Marked calls in the enclosing declaration: (kind, line)
    pub markers: Vec<(AttributeKind, usize)>,
}

impl fmt::Display for SiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.anchor)
    }
}

pub struct LiveEditor {
    config: EditorConfig,
    journal: Option<EditJournal>,
}

impl LiveEditor {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: EditJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn journal(&self) -> Option<&EditJournal> {
        self.journal.as_ref()
    }

    pub fn set_label(
        &self,
        ctx: &mut impl SessionContext,
        element: ElementId,
        text: &str,
    ) -> Result<EditReport> {
        self.set_attribute(ctx, element, AttributeKind::Label, text)
    }

    pub fn set_aria_label(
        &self,
        ctx: &mut impl SessionContext,
        element: ElementId,
        text: &str,
    ) -> Result<EditReport> {
        self.set_attribute(ctx, element, AttributeKind::AriaLabel, text)
    }

    pub fn set_title(
        &self,
        ctx: &mut impl SessionContext,
        element: ElementId,
        text: &str,
    ) -> Result<EditReport> {
        self.set_attribute(ctx, element, AttributeKind::Title, text)
    }

    pub fn set_alt_text(
        &self,
        ctx: &mut impl SessionContext,
        element: ElementId,
        text: &str,
    ) -> Result<EditReport> {
        self.set_attribute(ctx, element, AttributeKind::AltText, text)
    }

    pub fn apply(&self, ctx: &mut impl SessionContext, request: &EditRequest) -> Result<EditReport> {
        match request {
            EditRequest::SetLabel { element, text } => self.set_label(ctx, *element, text),
            EditRequest::SetAriaLabel { element, text } => self.set_aria_label(ctx, *element, text),
            EditRequest::SetTitle { element, text } => self.set_title(ctx, *element, text),
            EditRequest::SetAltText { element, text } => self.set_alt_text(ctx, *element, text),
            EditRequest::SetPageTitle { text } => self.set_page_title(ctx, text),
            EditRequest::PromoteToMainRole => self.promote_to_main_role(ctx),
        }
    }

    /// Set a label-like attribute on the component behind `element`.
    pub fn set_attribute(
        &self,
        ctx: &mut impl SessionContext,
        element: ElementId,
        kind: AttributeKind,
        text: &str,
    ) -> Result<EditReport> {
        let component = resolve_element(&*ctx, element)?;

        let capability = kind.required_capability();
        if !self.supports(&component, capability) {
            return Err(EditError::UnsupportedCapability {
                component: component.component_type,
                capability,
            });
        }

        let location = construction_site(&*ctx, &component)?;
        let path = ctx.source_file(&location);
        let tree = SyntaxTree::parse(&path)?;

        let anchor = locate::find_anchor(&tree, location.line)?;
        let receiver = locate::find_receiver(&tree, location.line);
        let scope = locate::declaration_scope(&tree, anchor);
        let existing = marker::find_existing(&tree, scope, kind, receiver.as_deref());
        debug!(
            "Anchor for {} at {}:{}: {} (receiver {:?}, existing {:?})",
            kind,
            path.display(),
            location.line,
            tree.node(anchor).label(),
            receiver,
            existing
        );

        let mods = plan::plan_attribute(
            &tree,
            kind,
            anchor,
            receiver.as_deref(),
            existing,
            text,
            &self.config.generation,
        )?;

        let operation = format!("set-{}", kind);
        let summary = format!("{} of {} set to {:?}", kind, component.component_type, text);
        self.commit(ctx, &tree, &mods, &location, &operation, summary)
    }

    /// Replace the page title of the current view.
    pub fn set_page_title(&self, ctx: &mut impl SessionContext, text: &str) -> Result<EditReport> {
        let view = current_view(&*ctx)?;
        let location = construction_site(&*ctx, &view)?;
        let path = ctx.source_file(&location);
        let tree = SyntaxTree::parse(&path)?;

        let declaration = locate::find_declaration(&tree, location.simple_type_name())?;
        let mods = plan::plan_page_title(&tree, declaration, text, &self.config.page_title)?;

        let summary = format!("page title of {} set to {:?}", location.simple_type_name(), text);
        self.commit(ctx, &tree, &mods, &location, "set-page-title", summary)
    }

    /// Give the current view the `main` landmark role.
    pub fn promote_to_main_role(&self, ctx: &mut impl SessionContext) -> Result<EditReport> {
        let view = current_view(&*ctx)?;
        let location = construction_site(&*ctx, &view)?;
        let path = ctx.source_file(&location);
        let tree = SyntaxTree::parse(&path)?;

        let name = location.simple_type_name();
        let declaration = locate::find_declaration(&tree, name)?;
        let constructor = locate::find_constructor(&tree, name);
        let mods = plan::plan_main_role(&tree, declaration, constructor, &self.config.main_role)?;

        let summary = format!("{} promoted to the main landmark", name);
        self.commit(ctx, &tree, &mods, &location, "promote-to-main-role", summary)
    }

    /// Where the component behind `element` was created.
    pub fn show_location(&self, ctx: &impl SessionContext, element: ElementId) -> Result<SiteReport> {
        let component = resolve_element(ctx, element)?;
        site_of(ctx, &component)
    }

    /// Where the current view was created.
    pub fn show_route(&self, ctx: &impl SessionContext) -> Result<SiteReport> {
        let view = current_view(ctx)?;
        site_of(ctx, &view)
    }

    /// Runtime-reported capabilities win; an empty set falls back to the catalog.
    fn supports(&self, component: &RuntimeComponent, capability: Capability) -> bool {
        if component.capabilities.is_empty() {
            self.config
                .capabilities_of(&component.component_type)
                .contains(&capability)
        } else {
            component.supports(capability)
        }
    }

    fn commit(
        &self,
        ctx: &mut impl SessionContext,
        tree: &SyntaxTree,
        mods: &[Modification],
        location: &ConstructionLocation,
        operation: &str,
        summary: String,
    ) -> Result<EditReport> {
        let path = tree.path().to_path_buf();
        let patch = surgical::apply(tree, mods)?;

        if !patch.changed(tree.text()) {
            info!("{}: already up to date ({})", path.display(), summary);
            return Ok(EditReport {
                remap: LineRemap::new(&path),
                path,
                changed: false,
                line_delta: 0,
                summary,
            });
        }

        surgical::write_atomic(&path, &patch.text)?;
        ctx.apply_remap(&patch.remap);
        info!(
            "{}: {} ({:+} line(s))",
            path.display(),
            summary,
            patch.line_delta
        );

        if let Some(journal) = &self.journal {
            let record = EditRecord {
                id: journal::generate_record_id(),
                timestamp: chrono::Utc::now(),
                session: ctx.session_id().to_string(),
                operation: operation.to_string(),
                file: path.clone(),
                line: location.line,
                line_delta: patch.line_delta,
                hash_before: journal::content_hash(tree.text()),
                hash_after: journal::content_hash(&patch.text),
            };
            if let Err(e) = journal.record(record) {
                warn!("Failed to record edit in {}: {}", journal.dir().display(), e);
            }
        }

        Ok(EditReport {
            path,
            changed: true,
            line_delta: patch.line_delta,
            remap: patch.remap,
            summary,
        })
    }
}

/// Describe what the locator finds at `line` of `path`.
pub fn inspect(path: &Path, line: usize) -> Result<SiteReport> {
    let tree = SyntaxTree::parse(path)?;
    let anchor = locate::find_anchor(&tree, line)?;
    let scope = locate::declaration_scope(&tree, anchor);

    Ok(SiteReport {
        path: path.to_path_buf(),
        line,
        anchor: tree.node(anchor).label(),
        receiver: locate::find_receiver(&tree, line),
        implicit_receiver: locate::implicit_receiver(&tree, anchor),
        markers: marker::markers_in(&tree, scope)
            .into_iter()
            .map(|(kind, id)| (kind, tree.node(id).start_line))
            .collect(),
    })
}

fn site_of(ctx: &impl SessionContext, component: &RuntimeComponent) -> Result<SiteReport> {
    let location = construction_site(ctx, component)?;
    inspect(&ctx.source_file(&location), location.line)
}

fn resolve_element(ctx: &impl SessionContext, element: ElementId) -> Result<RuntimeComponent> {
    ctx.resolve_element(element)
        .ok_or_else(|| EditError::ElementNotFound {
            session: ctx.session_id().to_string(),
            element: element.to_string(),
        })
}

fn current_view(ctx: &impl SessionContext) -> Result<RuntimeComponent> {
    ctx.current_view().ok_or_else(|| EditError::ElementNotFound {
        session: ctx.session_id().to_string(),
        element: "current view".to_string(),
    })
}

fn construction_site(
    ctx: &impl SessionContext,
    component: &RuntimeComponent,
) -> Result<ConstructionLocation> {
    ctx.construction_site(component)
        .ok_or_else(|| EditError::NotTracked {
            component: component.component_type.clone(),
        })
}
