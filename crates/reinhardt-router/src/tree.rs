//! Arena-backed tree used for route snapshots and live router state.
//!
//! Nodes never point at each other. Parent and child lookups go through the
//! owning [`Tree`] by [`NodeId`].

use std::ops::{Index, IndexMut};

/// Position of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
	pub const ROOT: NodeId = NodeId(0);

	pub fn index(self) -> usize {
		self.0
	}
}

#[derive(Debug, Clone)]
struct Node<T> {
	value: T,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}

/// A rooted tree stored in a flat arena.
#[derive(Debug, Clone)]
pub struct Tree<T> {
	nodes: Vec<Node<T>>,
}

impl<T> Tree<T> {
	pub fn new(root: T) -> Self {
		Self {
			nodes: vec![Node {
				value: root,
				parent: None,
				children: Vec::new(),
			}],
		}
	}

	pub fn root(&self) -> NodeId {
		NodeId::ROOT
	}

	/// Appends `value` as the last child of `parent`.
	pub fn push_child(&mut self, parent: NodeId, value: T) -> NodeId {
		let id = NodeId(self.nodes.len());
		self.nodes.push(Node {
			value,
			parent: Some(parent),
			children: Vec::new(),
		});
		self.nodes[parent.0].children.push(id);
		id
	}

	pub fn get(&self, id: NodeId) -> Option<&T> {
		self.nodes.get(id.0).map(|node| &node.value)
	}

	pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
		self.nodes.get_mut(id.0).map(|node| &mut node.value)
	}

	pub fn parent(&self, id: NodeId) -> Option<NodeId> {
		self.nodes[id.0].parent
	}

	pub fn children(&self, id: NodeId) -> &[NodeId] {
		&self.nodes[id.0].children
	}

	pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
		self.children(id).first().copied()
	}

	/// Other children of the same parent.
	pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
		match self.parent(id) {
			Some(parent) => self.children(parent).iter().copied().filter(|c| *c != id).collect(),
			None => Vec::new(),
		}
	}

	/// Node ids from the root down to `id`, inclusive.
	pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
		let mut path = vec![id];
		let mut current = id;
		while let Some(parent) = self.parent(current) {
			path.push(parent);
			current = parent;
		}
		path.reverse();
		path
	}

	pub fn depth(&self, id: NodeId) -> usize {
		self.path_from_root(id).len() - 1
	}

	/// All node ids in pre-order (parents before children).
	pub fn preorder(&self) -> Vec<NodeId> {
		let mut order = Vec::with_capacity(self.nodes.len());
		let mut stack = vec![NodeId::ROOT];
		while let Some(id) = stack.pop() {
			order.push(id);
			stack.extend(self.children(id).iter().rev().copied());
		}
		order
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	/// Builds a tree of the same shape, keeping node ids.
	pub fn map<U>(&self, mut f: impl FnMut(NodeId, &T) -> U) -> Tree<U> {
		Tree {
			nodes: self
				.nodes
				.iter()
				.enumerate()
				.map(|(index, node)| Node {
					value: f(NodeId(index), &node.value),
					parent: node.parent,
					children: node.children.clone(),
				})
				.collect(),
		}
	}
}

impl<T: Clone> Tree<T> {
	/// Copies the subtree rooted at `id` into a tree of its own.
	pub fn subtree(&self, id: NodeId) -> Tree<T> {
		let mut tree = Tree::new(self[id].clone());
		let mut pending = vec![(id, NodeId::ROOT)];
		while let Some((source, target)) = pending.pop() {
			for child in self.children(source) {
				let copied = tree.push_child(target, self[*child].clone());
				pending.push((*child, copied));
			}
		}
		tree
	}
}

impl<T> Index<NodeId> for Tree<T> {
	type Output = T;

	fn index(&self, id: NodeId) -> &T {
		&self.nodes[id.0].value
	}
}

impl<T> IndexMut<NodeId> for Tree<T> {
	fn index_mut(&mut self, id: NodeId) -> &mut T {
		&mut self.nodes[id.0].value
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	fn sample() -> (Tree<&'static str>, NodeId, NodeId, NodeId) {
		let mut tree = Tree::new("root");
		let a = tree.push_child(tree.root(), "a");
		let b = tree.push_child(tree.root(), "b");
		let c = tree.push_child(a, "c");
		(tree, a, b, c)
	}

	#[rstest]
	fn test_parent_and_children_lookups() {
		let (tree, a, b, c) = sample();

		assert_eq!(tree.parent(c), Some(a));
		assert_eq!(tree.parent(tree.root()), None);
		assert_eq!(tree.children(tree.root()), &[a, b]);
		assert_eq!(tree.first_child(a), Some(c));
		assert_eq!(tree.siblings(a), vec![b]);
	}

	#[rstest]
	fn test_path_from_root_and_depth() {
		let (tree, a, _, c) = sample();

		assert_eq!(tree.path_from_root(c), vec![tree.root(), a, c]);
		assert_eq!(tree.depth(c), 2);
	}

	#[rstest]
	fn test_preorder_visits_parents_first() {
		let (tree, ..) = sample();

		let values: Vec<&str> = tree.preorder().into_iter().map(|id| tree[id]).collect();

		assert_eq!(values, vec!["root", "a", "c", "b"]);
	}

	#[rstest]
	fn test_map_keeps_ids() {
		let (tree, _, b, _) = sample();

		let lengths = tree.map(|_, value| value.len());

		assert_eq!(lengths[b], 1);
		assert_eq!(lengths[lengths.root()], 4);
	}

	#[rstest]
	fn test_subtree_copies_descendants_in_order() {
		let mut tree = Tree::new("root");
		let a = tree.push_child(tree.root(), "a");
		tree.push_child(tree.root(), "b");
		tree.push_child(a, "c");
		tree.push_child(a, "d");

		let subtree = tree.subtree(a);

		let values: Vec<&str> = subtree.preorder().into_iter().map(|id| subtree[id]).collect();
		assert_eq!(values, vec!["a", "c", "d"]);
		assert_eq!(subtree.parent(subtree.root()), None);
	}
}
