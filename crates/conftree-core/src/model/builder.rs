use super::configuration::{Configuration, ConfigurationHeader};
use super::node::{KeyValueKind, ListKind, NodeId};
use super::tree::{ConfigTree, NodeAliases};
use crate::errors::Result;

/// Assembles a tree bottom-up on behalf of a format parser
///
/// Every node created here stays in `Loading` until the finished
/// configuration is passed through `Configuration::loaded`.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: ConfigTree,
    root: NodeId,
    header: ConfigurationHeader,
}

impl TreeBuilder {
    /// Start a tree whose root path node is called `root_name`
    ///
    /// # Errors
    ///
    /// `InvalidName` for a name the path grammar cannot address.
    pub fn new(root_name: &str) -> Result<Self> {
        Self::with_aliases(root_name, NodeAliases::default())
    }

    /// Same as `new`, with non-default names for the reserved children
    ///
    /// # Errors
    ///
    /// `InvalidName` or `Configuration` if the aliases are unusable.
    pub fn with_aliases(root_name: &str, aliases: NodeAliases) -> Result<Self> {
        aliases.validate()?;
        let mut tree = ConfigTree::with_aliases(aliases);
        let root = tree.new_path_node(root_name)?;
        tree.set_root(root)?;
        Ok(Self {
            tree,
            root,
            header: ConfigurationHeader::default(),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn header(mut self, header: ConfigurationHeader) -> Self {
        self.header = header;
        self
    }

    pub fn header_mut(&mut self) -> &mut ConfigurationHeader {
        &mut self.header
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ConfigTree {
        &mut self.tree
    }

    pub fn path(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let id = self.tree.new_path_node(name)?;
        self.attach(parent, id)?;
        Ok(id)
    }

    pub fn value(
        &mut self,
        parent: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<NodeId> {
        let id = self.tree.new_value_node(name, value)?;
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Values list filled from `values`, in order
    pub fn values<I, S>(&mut self, parent: NodeId, name: &str, values: I) -> Result<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = self.tree.new_list_node(name, ListKind::Values)?;
        for value in values {
            self.tree.add_value(id, value)?;
        }
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Empty elements list; populate with `element`
    pub fn elements(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let id = self.tree.new_list_node(name, ListKind::Elements)?;
        self.attach(parent, id)?;
        Ok(id)
    }

    pub fn element(&mut self, list: NodeId, name: &str) -> Result<NodeId> {
        let id = self.tree.new_path_node(name)?;
        self.tree.add_element(list, id)?;
        Ok(id)
    }

    pub fn parameter(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.tree
            .set_reserved_value(node, KeyValueKind::Parameters, key, value)
    }

    pub fn property(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.tree
            .set_reserved_value(node, KeyValueKind::Properties, key, value)
    }

    pub fn attribute(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        self.tree
            .set_reserved_value(node, KeyValueKind::Attributes, key, value)
    }

    pub fn describe(&mut self, node: NodeId, description: impl Into<String>) -> Result<()> {
        self.tree.set_description(node, Some(description.into()))
    }

    /// Mark a node as failed to parse; `Configuration::loaded` will refuse
    pub fn fail(&mut self, node: NodeId, message: impl Into<String>) -> Result<()> {
        self.tree.set_error(node, message)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.tree.add_child(parent, child)
    }

    /// Hand the tree and header over as a configuration (still `Loading`)
    pub fn build(self) -> Configuration {
        Configuration::from_header(self.header, self.tree)
    }
}
