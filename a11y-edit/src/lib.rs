pub mod config;
pub mod engine;
pub mod error;
pub mod escape;
pub mod imports;
pub mod journal;
pub mod locate;
pub mod location;
pub mod marker;
pub mod plan;
pub mod session;
pub mod surgical;
pub mod syntax;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, EditorConfig};
pub use engine::{EditReport, EditRequest, LiveEditor, SiteReport};
pub use error::{EditError, Result};
pub use journal::{EditJournal, EditRecord};
pub use location::{ConstructionLocation, LineRemap, LocationTable, SourceFile};
pub use marker::AttributeKind;
pub use session::{Capability, ElementId, RuntimeComponent, Session, SessionContext, SessionId};
