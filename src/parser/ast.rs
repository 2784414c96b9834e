//! Abstract Syntax Tree types for the PF declaration language

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// Marker name that turns a declaration into a template
pub const TEMPLATE_MARKER: &str = "template";
/// Marker name that turns a declaration into a generation target
pub const PROTOTYPE_MARKER: &str = "prototype";
/// Marker name signalling a prior compiled form of the declaration
pub const COMPILED_MARKER: &str = "compiled";

/// Check whether an annotation name is understood by the generator itself
/// rather than resolved through the template machinery.
pub fn is_builtin_marker(name: &str) -> bool {
    matches!(name, TEMPLATE_MARKER | PROTOTYPE_MARKER | COMPILED_MARKER)
}

/// AST node with source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Valid identifier (alphanumeric + underscore, starts with letter/_)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dot-separated qualified name: `demo.users.User`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    pub segments: Vec<String>,
}

impl QualifiedName {
    pub fn new(segments: Vec<String>) -> Self {
        Self { segments }
    }

    /// Build a single-segment name
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Split a dotted string into a qualified name
    pub fn from_dotted(name: &str) -> Self {
        Self {
            segments: name.split('.').map(|s| s.to_string()).collect(),
        }
    }

    /// The unqualified (last) segment
    pub fn simple_name(&self) -> &str {
        self.segments
            .last()
            .expect("QualifiedName must have at least one segment")
    }

    /// Everything before the last segment, if any
    pub fn qualifier(&self) -> Option<QualifiedName> {
        if self.segments.len() > 1 {
            Some(QualifiedName {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    /// Append a segment, producing a longer name
    pub fn child(&self, name: impl Into<String>) -> QualifiedName {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        QualifiedName { segments }
    }

    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Root AST node - one parsed source file
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub package: Option<Spanned<QualifiedName>>,
    pub imports: Vec<Spanned<QualifiedName>>,
    pub declarations: Vec<Spanned<Declaration>>,
}

impl SourceUnit {
    pub fn package_name(&self) -> Option<&QualifiedName> {
        self.package.as_ref().map(|p| &p.node)
    }

    /// Fully qualify a top-level declaration name against this unit's package
    pub fn qualify(&self, simple: &str) -> QualifiedName {
        match self.package_name() {
            Some(pkg) => pkg.child(simple),
            None => QualifiedName::simple(simple),
        }
    }

    /// First declaration in the unit, if any
    pub fn primary(&self) -> Option<&Spanned<Declaration>> {
        self.declarations.first()
    }

    /// Find a top-level declaration by simple name
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations
            .iter()
            .map(|d| &d.node)
            .find(|d| d.name.node.as_str() == name)
    }

    /// Resolve an annotation reference against this unit's imports and
    /// package. Dotted references are already fully qualified; simple
    /// references match an import by last segment, falling back to the
    /// unit's own package. Built-in marker names stay unqualified.
    pub fn resolve_name(&self, name: &QualifiedName) -> QualifiedName {
        if !name.is_simple() {
            return name.clone();
        }
        let simple = name.simple_name();
        if is_builtin_marker(simple) {
            return name.clone();
        }
        for import in &self.imports {
            if import.node.simple_name() == simple {
                return import.node.clone();
            }
        }
        self.qualify(simple)
    }
}

/// Declaration flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// Class-like declaration with fields and functions
    Record,
    /// Interface-like declaration carrying signatures only
    Iface,
    /// Annotation-like declaration; the form templates take
    Marker,
}

impl DeclKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DeclKind::Record => "record",
            DeclKind::Iface => "iface",
            DeclKind::Marker => "marker",
        }
    }
}

/// A named, annotated declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: Spanned<Identifier>,
    pub annotations: Vec<Spanned<Annotation>>,
    pub members: Vec<Spanned<Member>>,
}

impl Declaration {
    /// Look up an annotation by its unqualified name
    pub fn annotation(&self, simple: &str) -> Option<&Annotation> {
        self.annotations
            .iter()
            .map(|a| &a.node)
            .find(|a| a.name.node.simple_name() == simple)
    }

    pub fn has_annotation(&self, simple: &str) -> bool {
        self.annotation(simple).is_some()
    }

    /// True for declarations marked as templates
    pub fn is_template(&self) -> bool {
        self.has_annotation(TEMPLATE_MARKER)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.members.iter().filter_map(|m| match &m.node {
            Member::Field(f) => Some(f),
            _ => None,
        })
    }

    pub fn functions(&self) -> impl Iterator<Item = &FnDecl> {
        self.members.iter().filter_map(|m| match &m.node {
            Member::Function(f) => Some(f),
            _ => None,
        })
    }

    pub fn nested(&self) -> impl Iterator<Item = &Declaration> {
        self.members.iter().filter_map(|m| match &m.node {
            Member::Nested(d) => Some(d),
            _ => None,
        })
    }

    /// Check for a member (of any flavor) with the given name
    pub fn has_member_named(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.node.name() == name)
    }
}

/// A member of a declaration body
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(FieldDecl),
    Function(FnDecl),
    /// Nested declaration (records may nest records)
    Nested(Declaration),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Field(f) => f.name.node.as_str(),
            Member::Function(f) => f.name.node.as_str(),
            Member::Nested(d) => d.name.node.as_str(),
        }
    }
}

/// Field member: `field name: type`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub annotations: Vec<Spanned<Annotation>>,
    pub name: Spanned<Identifier>,
    pub ty: Spanned<TypeRef>,
}

/// Function member: `fn name(params): type`
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub annotations: Vec<Spanned<Annotation>>,
    pub name: Spanned<Identifier>,
    pub params: Vec<Spanned<Param>>,
    pub ret: Option<Spanned<TypeRef>>,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Spanned<Identifier>,
    pub ty: Spanned<TypeRef>,
}

/// Reference to a type by plain or qualified name
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    pub name: QualifiedName,
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: QualifiedName::from_dotted(&name.into()),
        }
    }
}

impl std::fmt::Display for TypeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Annotation usage: `@name(key: value, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub name: Spanned<QualifiedName>,
    pub args: Vec<(Spanned<Identifier>, Spanned<AnnotationValue>)>,
}

impl Annotation {
    /// Build an argument-less annotation
    pub fn marker(name: QualifiedName, span: Span) -> Self {
        Self {
            name: Spanned::new(name, span),
            args: Vec::new(),
        }
    }

    pub fn simple_name(&self) -> &str {
        self.name.node.simple_name()
    }

    /// Look up an argument value by key
    pub fn arg(&self, key: &str) -> Option<&AnnotationValue> {
        self.args
            .iter()
            .find(|(k, _)| k.node.as_str() == key)
            .map(|(_, v)| &v.node)
    }

    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        match self.arg(key) {
            Some(AnnotationValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        match self.arg(key) {
            Some(AnnotationValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn class_arg(&self, key: &str) -> Option<&QualifiedName> {
        match self.arg(key) {
            Some(AnnotationValue::ClassRef(n)) => Some(n),
            _ => None,
        }
    }
}

/// Closed set of annotation argument values
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Bare identifier used as an enum-like constant
    Keyword(String),
    /// Dot-qualified reference to another declaration
    ClassRef(QualifiedName),
    Array(Vec<AnnotationValue>),
}
