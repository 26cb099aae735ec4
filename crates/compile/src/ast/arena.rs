use crate::ast::{Node, Param};
use crate::error::{Error, Result};

/// A dense 32-bit handle to a [`Node`] in an [`Arena`]. Equality is
/// identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(transparent)]
pub(crate) struct NodeId(u32);

/// Refers to zero or more consecutive handles in an arena's list table, such
/// as block children or call arguments.
#[derive(Clone, Copy, Debug)]
pub(crate) struct NodeList {
    first: u32,
    len: u32,
}

/// Refers to zero or more consecutive entries in an arena's parameter table.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ParamList {
    first: u32,
    len: u32,
}

/// Owns every node of a parsed translation unit. Append-only; the tree is
/// read-only once parsing completes.
#[derive(Debug, Default)]
pub(crate) struct Arena<'src> {
    nodes: Vec<Node<'src>>,
    lists: Vec<NodeId>,
    params: Vec<Param<'src>>,
}

impl<'src> Arena<'src> {
    pub(crate) fn alloc(&mut self, node: Node<'src>) -> Result<NodeId> {
        let id = u32::try_from(self.nodes.len()).map_err(|_| Error::Overflow)?;
        self.nodes.push(node);
        Ok(NodeId(id))
    }

    pub(crate) fn get(&self, id: NodeId) -> Node<'src> {
        self.nodes[id.0 as usize]
    }

    pub(crate) fn alloc_list(&mut self, ids: &[NodeId]) -> Result<NodeList> {
        let first = u32::try_from(self.lists.len()).map_err(|_| Error::Overflow)?;
        let len = u32::try_from(ids.len()).map_err(|_| Error::Overflow)?;
        self.lists.extend_from_slice(ids);
        Ok(NodeList { first, len })
    }

    pub(crate) fn list(&self, list: NodeList) -> &[NodeId] {
        &self.lists[list.first as usize..][..list.len as usize]
    }

    pub(crate) fn alloc_params(&mut self, params: &[Param<'src>]) -> Result<ParamList> {
        let first = u32::try_from(self.params.len()).map_err(|_| Error::Overflow)?;
        let len = u32::try_from(params.len()).map_err(|_| Error::Overflow)?;
        self.params.extend_from_slice(params);
        Ok(ParamList { first, len })
    }

    pub(crate) fn params(&self, list: ParamList) -> &[Param<'src>] {
        &self.params[list.first as usize..][..list.len as usize]
    }

    /// Every node in the arena, in allocation order.
    pub(crate) fn nodes(&self) -> impl Iterator<Item = &Node<'src>> {
        self.nodes.iter()
    }
}
