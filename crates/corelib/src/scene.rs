//! Scene graph: an arena of nodes with parent/child links.
//!
//! Node 0 is the scene root. Nodes are spawned detached and become visible to
//! [`SceneGraph::renderables`] / [`SceneGraph::lights`] once attached under the
//! root. Nodes are never removed, so a [`NodeId`] stays valid for the lifetime
//! of the graph.

use crate::{
    Mat4, Vec3,
    error::{CoreError, CoreResult},
    handle::MeshHandle,
    light::Light,
    material::Material,
    transform::Transform,
};

/// Node id (dense, index into the node array).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Drawable surface: geometry plus the material it is shaded with.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshInstance {
    pub mesh: MeshHandle,
    pub material: Material,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh(MeshInstance),
    Light(Light),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, NodeKind::Group)
    }

    pub fn mesh(name: impl Into<String>, instance: MeshInstance) -> Self {
        Self::new(name, NodeKind::Mesh(instance))
    }

    pub fn light(name: impl Into<String>, light: Light) -> Self {
        Self::new(name, NodeKind::Light(light))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Mutable material of a mesh node, `None` for other kinds.
    pub fn material_mut(&mut self) -> Option<&mut Material> {
        match &mut self.kind {
            NodeKind::Mesh(instance) => Some(&mut instance.material),
            _ => None,
        }
    }
}

/// Attached mesh node with its resolved world matrix.
#[derive(Clone, Copy, Debug)]
pub struct Renderable {
    pub node: NodeId,
    pub world: Mat4,
    pub instance: MeshInstance,
}

/// Attached light with its resolved world position.
#[derive(Clone, Copy, Debug)]
pub struct SceneLight {
    pub node: NodeId,
    pub position: Vec3,
    pub light: Light,
}

pub struct SceneGraph {
    nodes: Vec<Node>,
}

impl SceneGraph {
    pub const ROOT: NodeId = NodeId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![Node::group("Scene")],
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        Self::ROOT
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        // the root always exists
        false
    }

    /// Insert a detached node. Links already present on `node` are discarded.
    pub fn spawn(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.parent = None;
        node.children.clear();
        self.nodes.push(node);
        id
    }

    /// Insert `node` as a new last child of the root.
    pub fn spawn_attached(&mut self, node: Node) -> NodeId {
        let id = self.spawn(node);
        self.nodes[id.index()].parent = Some(Self::ROOT);
        self.nodes[Self::ROOT.index()].children.push(id);
        id
    }

    /// Make `child` the last child of `parent`.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> CoreResult<()> {
        self.check(child)?;
        self.check(parent)?;
        if child == Self::ROOT || self.nodes[child.index()].parent.is_some() {
            return Err(CoreError::AlreadyAttached(child));
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(CoreError::WouldCycle(child));
            }
            cursor = self.nodes[id.index()].parent;
        }

        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        Ok(())
    }

    /// Attach `child` directly under the scene root.
    #[inline]
    pub fn add(&mut self, child: NodeId) -> CoreResult<()> {
        self.attach(child, Self::ROOT)
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Mutable access to a transform (for animation).
    #[inline]
    pub fn transform_mut(&mut self, id: NodeId) -> Option<&mut Transform> {
        self.nodes.get_mut(id.index()).map(|n| &mut n.transform)
    }

    /// `true` if the node is the root or hangs under it.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == Self::ROOT {
                return true;
            }
            cursor = self.node(current).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order list of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.node(id).is_none() {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            // reversed so the first child is visited first
            stack.extend(self.nodes[current.index()].children.iter().rev().copied());
        }
        out
    }

    /// Product of local matrices from the top of the node's chain down to it.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.node(id)?;
        let mut world = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = &self.nodes[parent.index()];
            world = node.transform.matrix() * world;
        }
        Some(world)
    }

    /// Every attached mesh node with its world matrix.
    pub fn renderables(&self) -> Vec<Renderable> {
        let mut out = Vec::new();
        self.visit_attached(|id, world, node| {
            if let NodeKind::Mesh(instance) = node.kind {
                out.push(Renderable {
                    node: id,
                    world,
                    instance,
                });
            }
        });
        out
    }

    /// Every attached light with its world position.
    pub fn lights(&self) -> Vec<SceneLight> {
        let mut out = Vec::new();
        self.visit_attached(|id, world, node| {
            if let NodeKind::Light(light) = node.kind {
                out.push(SceneLight {
                    node: id,
                    position: world.w_axis.truncate(),
                    light,
                });
            }
        });
        out
    }

    fn visit_attached(&self, mut f: impl FnMut(NodeId, Mat4, &Node)) {
        let mut stack = vec![(Self::ROOT, Mat4::IDENTITY)];
        while let Some((id, parent_world)) = stack.pop() {
            let node = &self.nodes[id.index()];
            let world = parent_world * node.transform.matrix();
            f(id, world, node);
            stack.extend(node.children.iter().rev().map(|&c| (c, world)));
        }
    }

    fn check(&self, id: NodeId) -> CoreResult<()> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(CoreError::UnknownNode(id))
        }
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}
