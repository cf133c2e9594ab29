//! Entities, members and test metadata extracted from C/C++ sources.

/// Kind of a documented declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Function,
    Variable,
    Typedef,
    Macro,
    MacroFunction,
    Struct,
    Union,
    Enum,
    EnumConstant,
    Class,
    Field,
    Generic,
    Test,
    Subtest,
    File,
}

impl EntityKind {
    /// Heading label shown before the entity name. Empty for kinds that
    /// render without a label.
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Function => "Function",
            EntityKind::Variable => "Variable",
            EntityKind::Typedef => "Type",
            EntityKind::Macro | EntityKind::MacroFunction => "Macro",
            EntityKind::Struct => "Struct",
            EntityKind::Union => "Union",
            EntityKind::Enum => "Enum",
            EntityKind::EnumConstant => "Enumerator",
            EntityKind::Class => "Class",
            EntityKind::Field => "Field",
            EntityKind::Generic | EntityKind::Test | EntityKind::Subtest | EntityKind::File => "",
        }
    }

    /// Prefix of the in-page anchor id.
    pub fn anchor_prefix(self) -> &'static str {
        match self {
            EntityKind::Function => "func",
            EntityKind::Variable => "var",
            EntityKind::Typedef => "type",
            EntityKind::Macro | EntityKind::MacroFunction => "macro",
            EntityKind::Struct => "struct",
            EntityKind::Union => "union",
            EntityKind::Enum => "enum",
            EntityKind::EnumConstant => "enumval",
            EntityKind::Class => "class",
            EntityKind::Field => "field",
            EntityKind::Generic => "sym",
            EntityKind::Test => "test",
            EntityKind::Subtest => "subtest",
            EntityKind::File => "file",
        }
    }

    pub fn is_macro(self) -> bool {
        matches!(self, EntityKind::Macro | EntityKind::MacroFunction)
    }

    /// Kinds that may carry members.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            EntityKind::Struct | EntityKind::Union | EntityKind::Enum | EntityKind::Class
        )
    }

    pub fn is_callable(self) -> bool {
        matches!(self, EntityKind::Function | EntityKind::MacroFunction)
    }
}

/// Build the anchor id for an entity of `kind` named `name`.
pub fn anchor_id(kind: EntityKind, name: &str) -> String {
    format!("{}-{}", kind.anchor_prefix(), name)
}

/// One `(type, name)` pair from a signature. Either side may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    pub ty: String,
    pub name: String,
}

impl Parameter {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            name: name.into(),
        }
    }
}

/// One documented declaration and its documented members.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentedEntity {
    /// May be empty for anonymous entities.
    pub name: String,
    pub kind: EntityKind,
    /// Normalized comment text; rewritten once by the legacy translator
    /// when conversion is enabled.
    pub comment: String,
    pub signature: String,
    pub source_file: String,
    /// 1-based; 0 when unknown.
    pub source_line: usize,
    pub return_type: String,
    pub parameters: Vec<Parameter>,
    /// Non-empty only for container kinds.
    pub members: Vec<DocumentedEntity>,
}

impl DocumentedEntity {
    pub fn new(name: impl Into<String>, kind: EntityKind, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            comment: comment.into(),
            signature: String::new(),
            source_file: String::new(),
            source_line: 0,
            return_type: String::new(),
            parameters: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn anchor(&self) -> String {
        anchor_id(self.kind, &self.name)
    }

    /// Type of the signature parameter called `name`, if any.
    pub fn parameter_type(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.name == name && !p.ty.is_empty())
            .map(|p| p.ty.as_str())
    }
}

// -- Test catalog ---------------------------------------------------------------

/// Insertion-ordered `key -> value` mapping. Re-inserting a key replaces
/// the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut String> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Lookup tolerant of case and of `_`, `-` and space being used
    /// interchangeably, so `mega feature` finds `mega_feature`.
    pub fn get_loose(&self, key: &str) -> Option<&str> {
        let wanted = normalize_key(key);
        self.entries
            .iter()
            .find(|(k, _)| normalize_key(k) == wanted)
            .map(|(_, v)| v.as_str())
    }

    /// True when `key` is absent or maps to an empty value.
    pub fn is_blank(&self, key: &str) -> bool {
        self.get(key).map_or(true, |v| v.trim().is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lower-case and fold spaces and hyphens into underscores.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}

/// Condition guarding a branch of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Literal condition expression from `if (...)`.
    Expr(String),
    /// A plain `else`.
    Otherwise,
}

/// One synthesized action from a test body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Text(String),
    Branch {
        condition: Condition,
        steps: Vec<Step>,
    },
}

impl Step {
    pub fn text(&self) -> Option<&str> {
        match self {
            Step::Text(t) => Some(t),
            Step::Branch { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtestMetadata {
    pub name: String,
    pub fields: FieldMap,
    /// 1-based line of the declaring call; 0 when only declared in comments.
    pub source_line: usize,
    pub steps: Vec<Step>,
}

impl SubtestMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.fields.get("dynamic") == Some("true")
    }
}

/// Structured metadata of one test source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestMetadata {
    pub name: String,
    pub source_file: String,
    pub fields: FieldMap,
    pub subtests: Vec<SubtestMetadata>,
}

impl TestMetadata {
    pub fn subtest(&self, name: &str) -> Option<&SubtestMetadata> {
        self.subtests.iter().find(|s| s.name == name)
    }

    pub fn subtest_mut(&mut self, name: &str) -> Option<&mut SubtestMetadata> {
        self.subtests.iter_mut().find(|s| s.name == name)
    }
}
