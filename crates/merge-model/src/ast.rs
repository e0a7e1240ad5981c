//! Syntax of the declaration language as produced by the parser.

use crate::model::{FileId, Loc};

#[derive(Debug, Clone)]
pub struct SourceFile {
    pub file_id: FileId,
    pub package: Vec<String>,
    pub imports: Vec<Import>,
    pub declarations: Vec<TypeDecl>,
}

impl SourceFile {
    pub fn package_name(&self) -> String {
        self.package.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: Vec<String>,
    pub alias: Option<String>,
    pub is_star: bool,
}

impl Import {
    /// The simple name this import makes visible, if it is not a star import.
    pub fn visible_name(&self) -> Option<&str> {
        if self.is_star {
            return None;
        }
        self.alias
            .as_deref()
            .or_else(|| self.path.last().map(String::as_str))
    }
}

/// A possibly qualified type name as written in source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName {
    pub path: Vec<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKeyword {
    Interface,
    Class,
    Object,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    /// Location of the name identifier.
    pub loc: Loc,
    pub keyword: DeclKeyword,
    pub modifiers: Vec<String>,
    pub annotations: Vec<Annotation>,
    pub supertypes: Vec<TypeName>,
    pub members: Vec<TypeDecl>,
}

impl TypeDecl {
    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub path: Vec<String>,
    pub loc: Loc,
    pub args: Vec<AnnotationArg>,
}

impl Annotation {
    /// Looks up an argument by name, falling back to the positional argument at `position`.
    pub fn argument(&self, name: &str, position: usize) -> Option<&AnnotationArg> {
        self.args
            .iter()
            .find(|arg| arg.name.as_deref() == Some(name))
            .or_else(|| {
                self.args
                    .iter()
                    .take_while(|arg| arg.name.is_none())
                    .nth(position)
            })
    }
}

#[derive(Debug, Clone)]
pub struct AnnotationArg {
    pub name: Option<String>,
    pub value: AnnotationValue,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub enum AnnotationValue {
    ClassLiteral(TypeName),
    Array(Vec<AnnotationValue>),
    Other,
}

impl AnnotationValue {
    /// Flattens a single class literal or an array of them. Returns `None` if any element is
    /// not a class literal.
    pub fn class_literals(&self) -> Option<Vec<&TypeName>> {
        match self {
            AnnotationValue::ClassLiteral(name) => Some(vec![name]),
            AnnotationValue::Array(values) => {
                let mut names = vec![];
                for value in values {
                    names.extend(value.class_literals()?);
                }
                Some(names)
            }
            AnnotationValue::Other => None,
        }
    }
}
