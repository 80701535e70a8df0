pub mod css;
pub mod dom;
pub mod error;
pub mod generator;
pub mod id;
pub mod lint;
pub mod markup;
pub mod project;
pub mod render;
pub mod scanner;
pub mod source;
pub mod splice;

pub use dom::{DomHandle, DomNode, DomTree, Element};
pub use error::{GenerateError, ParseError, ProjectError, SpliceError, TagError};
pub use generator::{GeneratorConfig, generate_markup, regenerate};
pub use id::{ElementTag, TagAllocator};
pub use lint::{LintDiagnostic, LintSeverity, lint_source};
pub use project::{DesignTokens, MemoryStore, Project, ProjectStore};
pub use render::{mount, parse_html};
pub use scanner::{LayerNode, LayerShape, LayerTree, ScanOutcome, scan};
pub use splice::{Insertion, InsertionAnchor, Removal, insert, remove};

/// Assign a tag against the live document. See [`TagAllocator::assign`].
pub fn assign_tag(
    allocator: &mut TagAllocator,
    document: Option<&DomTree>,
    candidate_hint: &str,
) -> Result<ElementTag, TagError> {
    allocator.assign(document, candidate_hint)
}
