//! The staged config document as an arena of nodes.
//!
//! Nodes are owned by the tree's arena and addressed by [`NodeId`]. Parent
//! links are plain ids: they are advisory navigation only and are never
//! emitted by [`ConfigTree::to_value`], which only walks downwards.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::{Mapping, Number, Value};
use tracing::debug;

use crate::error::TreeError;
use crate::link;
use crate::schema::{FieldKind, Schema, ShapeId};

/// Address of a node inside its [`ConfigTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "a boolean",
            Scalar::Number(_) => "a number",
            Scalar::String(_) => "a string",
        }
    }
}

/// The content of a node.
#[derive(Debug, Clone)]
pub enum NodeValue {
    /// Named fields, in document order.
    Object(Vec<(String, NodeId)>),
    Sequence(Vec<NodeId>),
    Scalar(Scalar),
}

impl NodeValue {
    pub(crate) fn describe(&self) -> &'static str {
        match self {
            NodeValue::Object(_) => "a mapping",
            NodeValue::Sequence(_) => "a sequence",
            NodeValue::Scalar(scalar) => scalar.describe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    value: NodeValue,
    shape: Option<ShapeId>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn value(&self) -> &NodeValue {
        &self.value
    }

    /// The declared shape of this node, if the schema knows it.
    pub fn shape(&self) -> Option<ShapeId> {
        self.shape
    }

    /// The node that structurally contains this one. `None` for the root
    /// and for detached subtrees.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

/// Iterator over the direct children of a node.
pub enum Children<'a> {
    Fields(std::slice::Iter<'a, (String, NodeId)>),
    Items(std::slice::Iter<'a, NodeId>),
    Empty,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        match self {
            Children::Fields(fields) => fields.next().map(|(_, id)| *id),
            Children::Items(items) => items.next().copied(),
            Children::Empty => None,
        }
    }
}

/// Pre-order walk over every node reachable from a starting node.
pub struct Walk<'a> {
    tree: &'a ConfigTree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        let start = self.stack.len();
        self.stack.extend(self.tree.children(id));
        // keep document order when popping
        self.stack[start..].reverse();
        Some(id)
    }
}

/// What the schema expects at a position in the document.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Object(ShapeId),
    List(ShapeId),
    Any,
}

impl From<Option<FieldKind>> for Expect {
    fn from(kind: Option<FieldKind>) -> Self {
        match kind {
            Some(FieldKind::Child(shape)) => Expect::Object(shape),
            Some(FieldKind::List(shape)) => Expect::List(shape),
            Some(FieldKind::LocalFile) | None => Expect::Any,
        }
    }
}

/// A parsed, linked config document.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    arena: Arena,
    root: NodeId,
    schema: Arc<Schema>,
    path: Option<PathBuf>,
}

impl ConfigTree {
    /// Parse a YAML document.
    ///
    /// Returns `Ok(None)` for an empty or null document.
    pub fn parse(bytes: &[u8], schema: Arc<Schema>) -> Result<Option<Self>, TreeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let value: Value = serde_yaml::from_slice(bytes)?;
        if value.is_null() {
            return Ok(None);
        }
        Self::from_value(value, schema).map(Some)
    }

    /// Read a whole stream and parse it with [`ConfigTree::parse`].
    pub fn from_reader(mut reader: impl Read, schema: Arc<Schema>) -> Result<Option<Self>, TreeError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse(&bytes, schema)
    }

    /// Build a tree from a generic YAML value, checking it against the schema
    /// and linking every node to its parent.
    pub fn from_value(value: Value, schema: Arc<Schema>) -> Result<Self, TreeError> {
        let mut arena = Arena::default();
        let root = insert(&mut arena, &schema, value, Expect::Object(schema.root()), "")?;
        let mut tree = Self {
            arena,
            root,
            schema,
            path: None,
        };
        let linked = link::parentify(&mut tree);
        debug!("Built config tree with {} linked nodes", linked);
        Ok(tree)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.arena.nodes[id.0]
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The storage location this tree was loaded from or will be saved to.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Parents of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |current| self.parent(*current))
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        match &self.node(id).value {
            NodeValue::Object(fields) => Children::Fields(fields.iter()),
            NodeValue::Sequence(items) => Children::Items(items.iter()),
            NodeValue::Scalar(_) => Children::Empty,
        }
    }

    /// Every node reachable from `id`, including `id` itself.
    pub fn walk(&self, id: NodeId) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![id],
        }
    }

    /// Look up a named field of an object node.
    pub fn field(&self, id: NodeId, name: &str) -> Option<NodeId> {
        match &self.node(id).value {
            NodeValue::Object(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, child)| *child),
            _ => None,
        }
    }

    pub fn scalar(&self, id: NodeId) -> Option<&Scalar> {
        match &self.node(id).value {
            NodeValue::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn shape_name(&self, id: NodeId) -> Option<&str> {
        self.node(id).shape.map(|shape| self.schema.shape(shape).name())
    }

    /// Resolve a dotted path such as `deploymentConfigurations[0].providers`.
    ///
    /// An empty path resolves to the root.
    pub fn resolve(&self, path: &str) -> Option<NodeId> {
        let mut current = self.root;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let (name, indexes) = match segment.find('[') {
                Some(at) => segment.split_at(at),
                None => (segment, ""),
            };
            if !name.is_empty() {
                current = self.field(current, name)?;
            }
            for index in indexes.split('[').filter(|s| !s.is_empty()) {
                let index: usize = index.strip_suffix(']')?.parse().ok()?;
                current = match &self.node(current).value {
                    NodeValue::Sequence(items) => *items.get(index)?,
                    _ => return None,
                };
            }
        }
        Some(current)
    }

    /// The dotted path of a node, computed from its parent links.
    pub fn node_path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            match &self.node(parent).value {
                NodeValue::Object(fields) => {
                    if let Some((name, _)) = fields.iter().find(|(_, child)| *child == current) {
                        segments.push(format!(".{}", name));
                    }
                }
                NodeValue::Sequence(items) => {
                    if let Some(index) = items.iter().position(|child| *child == current) {
                        segments.push(format!("[{}]", index));
                    }
                }
                NodeValue::Scalar(_) => {}
            }
            current = parent;
        }
        let joined: String = segments.into_iter().rev().collect();
        joined.strip_prefix('.').map(str::to_string).unwrap_or(joined)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Set `name` on an object node, replacing any previous value.
    ///
    /// A null node becomes an empty object first. The new subtree is checked
    /// against the field's declared shape and linked in place. The replaced
    /// subtree is released, so its ids must not be used afterwards.
    pub fn set_field(&mut self, object: NodeId, name: &str, value: Value) -> Result<NodeId, TreeError> {
        self.ensure_object(object)?;
        let expect = Expect::from(
            self.node(object)
                .shape
                .and_then(|shape| self.schema.shape(shape).field(name)),
        );
        let path = join_field(&self.node_path(object), name);
        let schema = Arc::clone(&self.schema);
        let child = insert(&mut self.arena, &schema, value, expect, &path)?;

        let NodeValue::Object(fields) = &mut self.arena.nodes[object.0].value else {
            unreachable!("ensure_object leaves an object node");
        };
        let replaced = match fields.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => Some(std::mem::replace(&mut entry.1, child)),
            None => {
                fields.push((name.to_string(), child));
                None
            }
        };
        if let Some(old) = replaced {
            self.release(old);
        }

        link::attach(self, object, child);
        Ok(child)
    }

    /// Append an item to a sequence node. A null node becomes an empty
    /// sequence first.
    pub fn push(&mut self, sequence: NodeId, value: Value) -> Result<NodeId, TreeError> {
        let path = self.node_path(sequence);
        let is_null = match &self.node(sequence).value {
            NodeValue::Sequence(_) => false,
            NodeValue::Scalar(Scalar::Null) => true,
            _ => {
                return Err(TreeError::NotA {
                    path: display_path(&path),
                    expected: "a sequence",
                })
            }
        };
        if is_null {
            self.arena.nodes[sequence.0].value = NodeValue::Sequence(Vec::new());
        }

        let expect = match self.list_item_shape(sequence) {
            Some(shape) => Expect::Object(shape),
            None => Expect::Any,
        };
        let len = match &self.node(sequence).value {
            NodeValue::Sequence(items) => items.len(),
            _ => 0,
        };
        let schema = Arc::clone(&self.schema);
        let child = insert(&mut self.arena, &schema, value, expect, &join_index(&path, len))?;
        if let NodeValue::Sequence(items) = &mut self.arena.nodes[sequence.0].value {
            items.push(child);
        }

        link::attach(self, sequence, child);
        Ok(child)
    }

    /// Remove a field from an object node, returning its former value.
    ///
    /// The removed nodes are released; their ids may be handed out again.
    pub fn remove_field(&mut self, object: NodeId, name: &str) -> Option<Value> {
        let NodeValue::Object(fields) = &mut self.arena.nodes[object.0].value else {
            return None;
        };
        let position = fields.iter().position(|(key, _)| key == name)?;
        let (_, removed) = fields.remove(position);
        let value = self.value_of(removed);
        self.release(removed);
        Some(value)
    }

    /// Return every node of a detached subtree to the free list.
    fn release(&mut self, top: NodeId) {
        let ids: Vec<NodeId> = self.walk(top).collect();
        for id in ids {
            self.arena.nodes[id.0] = Node {
                value: NodeValue::Scalar(Scalar::Null),
                shape: None,
                parent: None,
            };
            self.arena.free.push(id);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Convert back to a generic YAML value. Parent links are not emitted.
    pub fn to_value(&self) -> Value {
        self.value_of(self.root)
    }

    pub fn value_of(&self, id: NodeId) -> Value {
        match &self.node(id).value {
            NodeValue::Object(fields) => {
                let mut mapping = Mapping::with_capacity(fields.len());
                for (name, child) in fields {
                    mapping.insert(Value::String(name.clone()), self.value_of(*child));
                }
                Value::Mapping(mapping)
            }
            NodeValue::Sequence(items) => {
                Value::Sequence(items.iter().map(|child| self.value_of(*child)).collect())
            }
            NodeValue::Scalar(scalar) => match scalar {
                Scalar::Null => Value::Null,
                Scalar::Bool(b) => Value::Bool(*b),
                Scalar::Number(n) => Value::Number(n.clone()),
                Scalar::String(s) => Value::String(s.clone()),
            },
        }
    }

    pub fn to_yaml_string(&self) -> Result<String, TreeError> {
        serde_yaml::to_string(&self.to_value()).map_err(TreeError::Syntax)
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.arena.nodes[id.0].parent = parent;
    }

    fn ensure_object(&mut self, id: NodeId) -> Result<(), TreeError> {
        let is_null = match &self.node(id).value {
            NodeValue::Object(_) => false,
            NodeValue::Scalar(Scalar::Null) => true,
            _ => {
                return Err(TreeError::NotA {
                    path: display_path(&self.node_path(id)),
                    expected: "an object",
                })
            }
        };
        if is_null {
            self.arena.nodes[id.0].value = NodeValue::Object(Vec::new());
        }
        Ok(())
    }

    /// The item shape of a sequence, found through the field that holds it.
    fn list_item_shape(&self, sequence: NodeId) -> Option<ShapeId> {
        let parent = self.parent(sequence)?;
        let shape = self.node(parent).shape?;
        let NodeValue::Object(fields) = &self.node(parent).value else {
            return None;
        };
        let (name, _) = fields.iter().find(|(_, child)| *child == sequence)?;
        match self.schema.shape(shape).field(name) {
            Some(FieldKind::List(item)) => Some(item),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_yaml_string() {
            Ok(yaml) => f.write_str(&yaml),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Node storage. Slots released by replaced or removed subtrees are reused
/// before the vector grows.
#[derive(Debug, Clone, Default)]
struct Arena {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
}

impl Arena {
    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }
}

/// Put the nodes for `value` into the arena, unlinked, and return the id of
/// its top node.
fn insert(
    arena: &mut Arena,
    schema: &Schema,
    value: Value,
    expect: Expect,
    path: &str,
) -> Result<NodeId, TreeError> {
    let value = untag(value);
    let (value, shape) = match (expect, value) {
        (Expect::Object(shape), Value::Mapping(mapping)) => {
            (insert_mapping(arena, schema, mapping, Some(shape), path)?, Some(shape))
        }
        (Expect::Any, Value::Mapping(mapping)) => (insert_mapping(arena, schema, mapping, None, path)?, None),
        (Expect::List(shape), Value::Sequence(items)) => {
            (insert_sequence(arena, schema, items, Expect::Object(shape), path)?, None)
        }
        (Expect::Any, Value::Sequence(items)) => (insert_sequence(arena, schema, items, Expect::Any, path)?, None),
        (Expect::Object(shape), Value::Null) => (NodeValue::Scalar(Scalar::Null), Some(shape)),
        (Expect::Object(_), other) => {
            return Err(TreeError::Shape {
                path: display_path(path),
                expected: "a mapping",
                found: describe(&other),
            })
        }
        (Expect::List(_), Value::Null) => (NodeValue::Scalar(Scalar::Null), None),
        (Expect::List(_), other) => {
            return Err(TreeError::Shape {
                path: display_path(path),
                expected: "a sequence",
                found: describe(&other),
            })
        }
        (Expect::Any, other) => (NodeValue::Scalar(to_scalar(other)), None),
    };

    Ok(arena.alloc(Node {
        value,
        shape,
        parent: None,
    }))
}

fn insert_mapping(
    arena: &mut Arena,
    schema: &Schema,
    mapping: Mapping,
    shape: Option<ShapeId>,
    path: &str,
) -> Result<NodeValue, TreeError> {
    let mut fields: Vec<(String, NodeId)> = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let key = key_to_string(key).ok_or_else(|| TreeError::Key {
            path: display_path(path),
            reason: "keys must be scalars".to_string(),
        })?;
        // `1` and "1" are distinct YAML keys but the same field name
        if fields.iter().any(|(existing, _)| existing == &key) {
            return Err(TreeError::Key {
                path: display_path(path),
                reason: format!("`{}` appears more than once", key),
            });
        }
        let expect = Expect::from(shape.and_then(|shape| schema.shape(shape).field(&key)));
        let child = insert(arena, schema, value, expect, &join_field(path, &key))?;
        fields.push((key, child));
    }
    Ok(NodeValue::Object(fields))
}

fn insert_sequence(
    arena: &mut Arena,
    schema: &Schema,
    items: Vec<Value>,
    expect: Expect,
    path: &str,
) -> Result<NodeValue, TreeError> {
    let mut children = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        children.push(insert(arena, schema, item, expect, &join_index(path, index))?);
    }
    Ok(NodeValue::Sequence(children))
}

fn untag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => untag(tagged.value),
        other => other,
    }
}

fn to_scalar(value: Value) -> Scalar {
    match value {
        Value::Bool(b) => Scalar::Bool(b),
        Value::Number(n) => Scalar::Number(n),
        Value::String(s) => Scalar::String(s),
        _ => Scalar::Null,
    }
}

fn key_to_string(key: Value) -> Option<String> {
    match untag(key) {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some("null".to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn join_field(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn join_index(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

pub(crate) fn display_path(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}
