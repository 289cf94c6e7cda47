//! Declared node shapes.
//!
//! A shape names the object fields the engine knows something about: which
//! ones hold nested shaped objects, which ones hold lists of them, and which
//! ones hold paths to locally staged files. Fields a shape does not declare
//! are still carried through the tree untouched.
//!
//! New shapes opt into local file tracking by declaring `local_file` fields;
//! nothing else in the crate enumerates them.

mod halconfig;

use std::collections::HashMap;

use crate::error::SchemaError;

pub use halconfig::halconfig_schema;

/// Index of a shape inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

/// What a declared field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A nested object of the given shape.
    Child(ShapeId),
    /// A sequence whose items are objects of the given shape.
    List(ShapeId),
    /// An absolute path to a file staged outside the config document.
    LocalFile,
}

#[derive(Debug, Clone)]
enum FieldDecl {
    Child(String),
    List(String),
    LocalFile,
}

/// Builder-side declaration of one shape.
#[derive(Debug, Clone)]
pub struct Shape {
    name: String,
    fields: Vec<(String, FieldDecl)>,
}

impl Shape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare `field` as a nested object of shape `shape`.
    pub fn child(mut self, field: impl Into<String>, shape: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldDecl::Child(shape.into())));
        self
    }

    /// Declare `field` as a list of objects of shape `shape`.
    pub fn list(mut self, field: impl Into<String>, shape: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldDecl::List(shape.into())));
        self
    }

    /// Declare `field` as holding a local file path.
    pub fn local_file(mut self, field: impl Into<String>) -> Self {
        self.fields.push((field.into(), FieldDecl::LocalFile));
        self
    }
}

/// A resolved shape.
#[derive(Debug, Clone)]
pub struct ShapeDef {
    name: String,
    fields: Vec<(String, FieldKind)>,
}

impl ShapeDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the kind of a declared field.
    pub fn field(&self, field: &str) -> Option<FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| *kind)
    }

    /// Names of the fields declared as local file paths.
    pub fn local_file_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, kind)| *kind == FieldKind::LocalFile)
            .map(|(name, _)| name.as_str())
    }
}

/// A closed set of shapes with a designated root.
#[derive(Debug, Clone)]
pub struct Schema {
    root: ShapeId,
    shapes: Vec<ShapeDef>,
    by_name: HashMap<String, ShapeId>,
}

impl Schema {
    /// Start a schema whose documents have the shape named `root`.
    pub fn builder(root: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            root: root.into(),
            shapes: Vec::new(),
        }
    }

    /// A schema that declares nothing: every document is kept as untyped data.
    pub fn untyped() -> Self {
        Self {
            root: ShapeId(0),
            shapes: vec![ShapeDef {
                name: "document".to_string(),
                fields: Vec::new(),
            }],
            by_name: HashMap::from([("document".to_string(), ShapeId(0))]),
        }
    }

    pub fn root(&self) -> ShapeId {
        self.root
    }

    pub fn shape(&self, id: ShapeId) -> &ShapeDef {
        &self.shapes[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<ShapeId> {
        self.by_name.get(name).copied()
    }
}

pub struct SchemaBuilder {
    root: String,
    shapes: Vec<Shape>,
}

impl SchemaBuilder {
    pub fn shape(mut self, shape: Shape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Resolve shape references and produce the schema.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut by_name = HashMap::with_capacity(self.shapes.len());
        for (index, shape) in self.shapes.iter().enumerate() {
            if by_name.insert(shape.name.clone(), ShapeId(index)).is_some() {
                return Err(SchemaError::DuplicateShape(shape.name.clone()));
            }
        }

        let root = *by_name
            .get(&self.root)
            .ok_or_else(|| SchemaError::UnknownRoot(self.root.clone()))?;

        let mut shapes = Vec::with_capacity(self.shapes.len());
        for shape in self.shapes {
            let mut fields = Vec::with_capacity(shape.fields.len());
            for (field, decl) in shape.fields {
                let resolve = |target: String| {
                    by_name.get(&target).copied().ok_or_else(|| SchemaError::UnknownShape {
                        shape: shape.name.clone(),
                        field: field.clone(),
                        target,
                    })
                };
                let kind = match decl {
                    FieldDecl::Child(target) => FieldKind::Child(resolve(target)?),
                    FieldDecl::List(target) => FieldKind::List(resolve(target)?),
                    FieldDecl::LocalFile => FieldKind::LocalFile,
                };
                fields.push((field, kind));
            }
            shapes.push(ShapeDef {
                name: shape.name,
                fields,
            });
        }

        Ok(Schema {
            root,
            shapes,
            by_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_resolves_references() {
        let schema = Schema::builder("root")
            .shape(Shape::new("root").list("accounts", "account"))
            .shape(Shape::new("account").local_file("keyFile").local_file("certFile"))
            .build()
            .unwrap();

        let root = schema.shape(schema.root());
        assert_eq!(root.name(), "root");

        let account = schema.lookup("account").unwrap();
        assert_eq!(root.field("accounts"), Some(FieldKind::List(account)));
        assert_eq!(root.field("missing"), None);

        let files: Vec<_> = schema.shape(account).local_file_fields().collect();
        assert_eq!(files, vec!["keyFile", "certFile"]);
    }

    #[test]
    fn test_build_rejects_unknown_shape() {
        let err = Schema::builder("root")
            .shape(Shape::new("root").child("providers", "providers"))
            .build()
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::UnknownShape {
                shape: "root".to_string(),
                field: "providers".to_string(),
                target: "providers".to_string(),
            }
        );
    }

    #[test]
    fn test_build_rejects_duplicates_and_missing_root() {
        let err = Schema::builder("root")
            .shape(Shape::new("root"))
            .shape(Shape::new("root"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::DuplicateShape("root".to_string()));

        let err = Schema::builder("root")
            .shape(Shape::new("other"))
            .build()
            .unwrap_err();
        assert_eq!(err, SchemaError::UnknownRoot("root".to_string()));
    }

    #[test]
    fn test_untyped_schema() {
        let schema = Schema::untyped();
        let root = schema.shape(schema.root());
        assert_eq!(root.local_file_fields().count(), 0);
    }
}
