//! Template system: reusable declaration fragments
//!
//! A template is a marker declaration annotated `@template`. Declarations
//! referencing it by annotation receive its members, its configuration
//! defaults, and (transitively) the contributions of templates it references
//! itself.
//!
//! # Example
//!
//! ```text
//! @template
//! marker audited {
//!     field created_at: long
//!     field updated_at: long
//! }
//!
//! @audited
//! @prototype(interface: true)
//! record User {
//!     field name: string
//! }
//! ```

mod registry;
mod resolver;

pub use registry::{template_references, TemplateDefinition, TemplateError, TemplateRegistry};
pub use resolver::{resolve_templates, ExternalLookup, ResolutionOutcome};
