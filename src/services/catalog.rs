//! Catalog service
//!
//! Business logic over the tree and content repositories:
//! - tree/grid projections for the admin widget
//! - move validation against the nesting matrix, batch moves all-or-nothing
//! - visibility toggles and per-object cascading deletes
//! - relative-item editing
//! - breadcrumbs and the cached visible tree for public rendering
//!
//! Mutation endpoints answer with fixed plain-text bodies (`OK`,
//! `Can not move`, `Bad arguments`), so the error enum mirrors them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::cache::{CacheLayer, MemoryCache};
use crate::db::repositories::{
    ImageRepository, ItemRepository, SectionRepository, SortDir, TreeItemRepository,
};
use crate::models::{
    CatalogNode, ContentKind, ContentRef, Item, MovePoint, Section, TreeItem, TreeItemImage,
    TreeNode,
};
use crate::services::columns::ColumnModel;
use crate::services::registry::ContentRegistry;

/// Cache key of the assembled visible tree
const CACHE_KEY_VISIBLE_TREE: &str = "catalog:tree:visible";

/// Sentinel the tree widget sends for the root level
const ROOT_SENTINEL: &str = "root";

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A requested move violates the nesting matrix or would create a cycle
    #[error("Can not move")]
    CanNotMove,

    /// Malformed identifiers or parameters
    #[error("Bad arguments")]
    BadArguments,

    /// Referenced node does not exist
    #[error("Not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// One tree-widget entry: a child node of the expanded level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub text: String,
    pub id: i64,
    pub leaf: bool,
    pub cls: String,
}

/// One grid row of the admin console
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridRow {
    pub name: String,
    pub id: i64,
    pub cls: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub itemid: i64,
    pub show: bool,
    /// Zero for folder kinds, matching the widget's numeric columns
    pub price: f64,
    pub quantity: i64,
    pub has_image: bool,
    pub has_description: bool,
}

impl GridRow {
    fn from_node(node: &CatalogNode) -> Self {
        Self {
            name: node.name.clone(),
            id: node.tree_id,
            cls: node.css_class().to_string(),
            kind: node.content.kind.as_str().to_string(),
            itemid: node.content.id,
            show: node.show,
            price: node.price.unwrap_or(0.0),
            quantity: node.quantity.unwrap_or(0),
            has_image: node.has_image,
            has_description: node.has_description(),
        }
    }
}

/// Entry of the relative-items editor tree: an item with a checked flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeEntry {
    pub text: String,
    pub id: i64,
    pub leaf: bool,
    pub checked: bool,
}

/// Fields of the section / meta-item save endpoint
#[derive(Debug, Clone)]
pub struct SectionInput {
    pub name: String,
    pub description: Option<String>,
    pub show: bool,
    pub is_meta: bool,
}

impl Default for SectionInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            show: true,
            is_meta: false,
        }
    }
}

/// Fields of the item save endpoint
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i64>,
    pub show: bool,
    /// Section membership as a comma-separated list of section row IDs.
    /// `None` leaves the current set untouched.
    pub sections: Option<String>,
}

impl Default for ItemInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            price: None,
            quantity: None,
            show: true,
            sections: None,
        }
    }
}

/// Catalog service
pub struct CatalogService {
    tree: Arc<dyn TreeItemRepository>,
    sections: Arc<dyn SectionRepository>,
    items: Arc<dyn ItemRepository>,
    images: Arc<dyn ImageRepository>,
    registry: ContentRegistry,
    cache: Arc<MemoryCache>,
    grid_page_size: i64,
}

impl CatalogService {
    pub fn new(
        tree: Arc<dyn TreeItemRepository>,
        sections: Arc<dyn SectionRepository>,
        items: Arc<dyn ItemRepository>,
        images: Arc<dyn ImageRepository>,
        registry: ContentRegistry,
        cache: Arc<MemoryCache>,
        grid_page_size: i64,
    ) -> Self {
        Self {
            tree,
            sections,
            items,
            images,
            registry,
            cache,
            grid_page_size,
        }
    }

    pub fn registry(&self) -> &ContentRegistry {
        &self.registry
    }

    pub fn grid_page_size(&self) -> i64 {
        self.grid_page_size
    }

    /// Merged column model over the registered kinds
    pub fn column_model(&self) -> ColumnModel {
        ColumnModel::build(&self.registry)
    }

    // ------------------------------------------------------------------
    // Listings
    // ------------------------------------------------------------------

    /// Children of a node as tree-widget entries. `node` is a tree item
    /// ID or the `root` sentinel.
    pub async fn children_tree(&self, node: &str) -> Result<Vec<TreeEntry>, CatalogError> {
        let parent = parse_node_param(node)?;
        let nodes = self.tree.children_nodes(parent).await?;
        Ok(nodes
            .iter()
            .filter(|n| self.registry.passes_filters(n))
            .map(|n| TreeEntry {
                text: n.name.clone(),
                id: n.tree_id,
                leaf: n.leaf,
                cls: n.css_class().to_string(),
            })
            .collect())
    }

    /// Children of a node as grid rows.
    pub async fn children_grid(&self, node: &str) -> Result<Vec<GridRow>, CatalogError> {
        let parent = parse_node_param(node)?;
        let nodes = self.tree.children_nodes(parent).await?;
        Ok(nodes
            .iter()
            .filter(|n| self.registry.passes_filters(n))
            .map(GridRow::from_node)
            .collect())
    }

    /// A page of the flat grid plus the total count, for the remoting
    /// `objects` query.
    pub async fn grid_page(
        &self,
        start: i64,
        limit: i64,
        sort: &str,
        dir: &str,
    ) -> Result<(Vec<GridRow>, i64), CatalogError> {
        let limit = if limit > 0 { limit } else { self.grid_page_size };
        let start = start.max(0);
        let (nodes, total) = self
            .tree
            .nodes_page(start, limit, sort, SortDir::from_param(dir))
            .await?;
        Ok((nodes.iter().map(GridRow::from_node).collect(), total))
    }

    /// Every grid row without paging, for the plain changelist.
    pub async fn grid_all(&self) -> Result<Vec<GridRow>, CatalogError> {
        let nodes = self.tree.all_nodes().await?;
        Ok(nodes.iter().map(GridRow::from_node).collect())
    }

    /// A single node with its content resolved.
    pub async fn node(&self, id: i64) -> Result<CatalogNode, CatalogError> {
        self.tree.node(id).await?.ok_or(CatalogError::NotFound)
    }

    /// Ancestor chain of a node, root first, with content resolved.
    pub async fn breadcrumbs(&self, id: i64) -> Result<Vec<CatalogNode>, CatalogError> {
        let ancestors = self.tree.ancestors(id).await?;
        let mut chain = Vec::with_capacity(ancestors.len());
        for ancestor in ancestors {
            if let Some(node) = self.tree.node(ancestor.id).await? {
                chain.push(node);
            }
        }
        Ok(chain)
    }

    /// Images attached to the content row behind a tree node, oldest
    /// first.
    pub async fn node_images(&self, tree_id: i64) -> Result<Vec<TreeItemImage>, CatalogError> {
        let node = self.node(tree_id).await?;
        Ok(self.images.list_for(node.content).await?)
    }

    /// Derived price of a meta-item node: the minimum price among its
    /// child items.
    pub async fn meta_item_price(&self, tree_id: i64) -> Result<Option<f64>, CatalogError> {
        Ok(self.sections.min_child_price(tree_id).await?)
    }

    /// Every folder node (sections and meta-items), for the admin move
    /// and link forms.
    pub async fn folder_targets(&self) -> Result<Vec<CatalogNode>, CatalogError> {
        let all = self.tree.all_nodes().await?;
        Ok(all
            .into_iter()
            .filter(|n| n.content.kind != ContentKind::Item)
            .collect())
    }

    /// Resolve a public catalog page: the node, its visible children and
    /// its breadcrumbs. The slug must match the stored one.
    pub async fn resolve_page(
        &self,
        slug: &str,
        id: i64,
    ) -> Result<(CatalogNode, Vec<CatalogNode>, Vec<CatalogNode>), CatalogError> {
        let node = self.node(id).await?;
        if node.slug != slug || !node.show {
            return Err(CatalogError::NotFound);
        }
        let children = self
            .tree
            .children_nodes(Some(id))
            .await?
            .into_iter()
            .filter(|c| c.show)
            .collect();
        let crumbs = self.breadcrumbs(id).await?;
        Ok((node, children, crumbs))
    }

    /// The full tree of visible nodes, assembled from one query and
    /// cached. A hidden node prunes its whole subtree.
    pub async fn visible_tree(&self) -> Result<Vec<TreeNode>, CatalogError> {
        if let Some(cached) = self
            .cache
            .get::<Vec<TreeNode>>(CACHE_KEY_VISIBLE_TREE)
            .await?
        {
            return Ok(cached);
        }

        let nodes = self.tree.all_nodes().await?;
        let tree = assemble_tree(nodes);
        self.cache.set(CACHE_KEY_VISIBLE_TREE, &tree).await?;
        Ok(tree)
    }

    async fn invalidate_tree(&self) -> Result<()> {
        self.cache.delete(CACHE_KEY_VISIBLE_TREE).await
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Move a batch of nodes. Every requested move is validated against
    /// the nesting matrix and the cycle check before anything is written;
    /// one invalid pair rejects the whole batch.
    pub async fn move_nodes(
        &self,
        source: &str,
        target: &str,
        point: &str,
    ) -> Result<(), CatalogError> {
        let sources = parse_id_list(source)?;
        if sources.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let target = parse_node_param(target)?;
        let point = MovePoint::from_param(point);

        // The kind the sources will nest under after the move
        let new_parent = match (target, point) {
            (Some(target_id), MovePoint::Above) | (Some(target_id), MovePoint::Below) => {
                let anchor = self
                    .tree
                    .get_by_id(target_id)
                    .await?
                    .ok_or(CatalogError::CanNotMove)?;
                anchor.parent_id
            }
            (Some(target_id), MovePoint::LastChild) => Some(target_id),
            (None, _) => None,
        };

        let parent_kind = match new_parent {
            Some(parent_id) => Some(
                self.tree
                    .get_by_id(parent_id)
                    .await?
                    .ok_or(CatalogError::CanNotMove)?
                    .content
                    .kind,
            ),
            None => None,
        };

        for &source_id in &sources {
            let node = self
                .tree
                .get_by_id(source_id)
                .await?
                .ok_or(CatalogError::CanNotMove)?;
            if !node.content.kind.may_nest_under(parent_kind) {
                return Err(CatalogError::CanNotMove);
            }
            // A node may not move into its own subtree
            if let Some(parent_id) = new_parent {
                let subtree = self.tree.descendant_ids(source_id).await?;
                if subtree.contains(&parent_id) {
                    return Err(CatalogError::CanNotMove);
                }
            }
        }

        self.tree.move_all(&sources, target, point).await?;
        self.invalidate_tree().await?;
        tracing::info!(sources = ?sources, target = ?target, "Moved catalog nodes");
        Ok(())
    }

    /// Toggle visibility on a comma-separated list of tree item IDs.
    pub async fn set_visibility(&self, items: &str, visible: bool) -> Result<u64, CatalogError> {
        let ids = parse_id_list(items)?;
        let affected = self.tree.set_visibility(&ids, visible).await?;
        self.invalidate_tree().await?;
        Ok(affected)
    }

    /// Delete a comma-separated list of tree item IDs. Each node is
    /// deleted independently, cascading through its subtree and cleaning
    /// up content rows that lose their last link.
    pub async fn delete_nodes(&self, items: &str) -> Result<(), CatalogError> {
        let ids = parse_id_list(items)?;
        for id in ids {
            self.tree.delete_cascade(id).await?;
        }
        self.invalidate_tree().await?;
        Ok(())
    }

    /// Create a link: a second tree item referencing the same content
    /// row, placed as the last child of `target` (or at the root). The
    /// nesting matrix applies as for moves.
    pub async fn create_link(&self, tree_id: i64, target: &str) -> Result<i64, CatalogError> {
        let source = self
            .tree
            .get_by_id(tree_id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        let target = parse_node_param(target)?;

        let parent_kind = match target {
            Some(target_id) => Some(
                self.tree
                    .get_by_id(target_id)
                    .await?
                    .ok_or(CatalogError::CanNotMove)?
                    .content
                    .kind,
            ),
            None => None,
        };
        if !source.content.kind.may_nest_under(parent_kind) {
            return Err(CatalogError::CanNotMove);
        }

        let link = self
            .tree
            .create(&TreeItem::new(target, source.slug.clone(), source.content))
            .await?;
        self.invalidate_tree().await?;
        tracing::info!(source = tree_id, link = link.id, "Created catalog link");
        Ok(link.id)
    }

    // ------------------------------------------------------------------
    // Content editing
    // ------------------------------------------------------------------

    /// Create a section or meta-item under `target` (a tree item ID or
    /// the `root` sentinel). Returns the new tree item ID.
    pub async fn create_section(
        &self,
        target: &str,
        input: SectionInput,
    ) -> Result<i64, CatalogError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let kind = if input.is_meta {
            ContentKind::MetaItem
        } else {
            ContentKind::Section
        };
        let parent = self.resolve_parent(target, kind).await?;

        let mut section = if input.is_meta {
            Section::new_meta(name.to_string(), input.description)
        } else {
            Section::new(name.to_string(), input.description)
        };
        section.show = input.show;
        let section = self.sections.create(&section).await?;

        let mut node = TreeItem::new(parent, slugify(name), ContentRef::new(kind, section.id));
        node.show = input.show;
        let node = self.tree.create(&node).await?;
        self.invalidate_tree().await?;
        tracing::info!(tree_id = node.id, name = %name, "Created section");
        Ok(node.id)
    }

    /// Update the section or meta-item behind a tree node. The meta flag
    /// is fixed at creation and ignored here.
    pub async fn update_section(
        &self,
        tree_id: i64,
        input: SectionInput,
    ) -> Result<(), CatalogError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let node = self.node(tree_id).await?;
        if node.content.kind == ContentKind::Item {
            return Err(CatalogError::BadArguments);
        }
        let mut section = self
            .sections
            .get_by_id(node.content.id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        section.name = name.to_string();
        section.description = input.description;
        section.show = input.show;
        self.sections.update(&section).await?;
        self.tree.set_visibility(&[tree_id], input.show).await?;
        self.invalidate_tree().await?;
        Ok(())
    }

    /// Create an item under `target`. Returns the new tree item ID.
    pub async fn create_item(&self, target: &str, input: ItemInput) -> Result<i64, CatalogError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let parent = self.resolve_parent(target, ContentKind::Item).await?;

        let mut item = Item::new(
            name.to_string(),
            input.description,
            input.price,
            input.quantity,
        );
        item.show = input.show;
        let item = self.items.create(&item).await?;

        let mut node = TreeItem::new(
            parent,
            slugify(name),
            ContentRef::new(ContentKind::Item, item.id),
        );
        node.show = input.show;
        let node = self.tree.create(&node).await?;

        if let Some(sections) = input.sections.as_deref() {
            self.save_item_sections(item.id, sections).await?;
        }
        self.invalidate_tree().await?;
        tracing::info!(tree_id = node.id, name = %name, "Created item");
        Ok(node.id)
    }

    /// Update the item behind a tree node. A `sections` value replaces
    /// the section membership; `None` leaves it untouched.
    pub async fn update_item(&self, tree_id: i64, input: ItemInput) -> Result<(), CatalogError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let node = self.node(tree_id).await?;
        if node.content.kind != ContentKind::Item {
            return Err(CatalogError::BadArguments);
        }
        let mut item = self
            .items
            .get_by_id(node.content.id)
            .await?
            .ok_or(CatalogError::NotFound)?;
        item.name = name.to_string();
        item.description = input.description;
        item.price = input.price;
        item.quantity = input.quantity;
        item.show = input.show;
        self.items.update(&item).await?;
        self.tree.set_visibility(&[tree_id], input.show).await?;

        if let Some(sections) = input.sections.as_deref() {
            self.save_item_sections(item.id, sections).await?;
        }
        self.invalidate_tree().await?;
        Ok(())
    }

    /// Attach an image to the content row behind a tree node. Returns the
    /// image ID.
    pub async fn add_image(
        &self,
        tree_id: i64,
        path: &str,
        palette: bool,
    ) -> Result<i64, CatalogError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(CatalogError::BadArguments);
        }
        let node = self.node(tree_id).await?;
        let image = self
            .images
            .create(&TreeItemImage::new(node.content, path.to_string(), palette))
            .await?;
        self.invalidate_tree().await?;
        Ok(image.id)
    }

    /// Remove an image by its ID.
    pub async fn delete_image(&self, id: i64) -> Result<(), CatalogError> {
        self.images.delete(id).await?;
        self.invalidate_tree().await?;
        Ok(())
    }

    /// Resolve a creation target to a parent ID, checking the nesting
    /// matrix for the kind being created.
    async fn resolve_parent(
        &self,
        target: &str,
        kind: ContentKind,
    ) -> Result<Option<i64>, CatalogError> {
        let parent = parse_node_param(target)?;
        let parent_kind = match parent {
            Some(parent_id) => Some(
                self.tree
                    .get_by_id(parent_id)
                    .await?
                    .ok_or(CatalogError::CanNotMove)?
                    .content
                    .kind,
            ),
            None => None,
        };
        if !kind.may_nest_under(parent_kind) {
            return Err(CatalogError::CanNotMove);
        }
        Ok(parent)
    }

    /// Replace the section membership of an item. Every referenced
    /// section row must exist.
    async fn save_item_sections(&self, item_id: i64, sections: &str) -> Result<(), CatalogError> {
        let mut section_ids = Vec::new();
        for id in parse_id_list(sections)? {
            self.sections
                .get_by_id(id)
                .await?
                .ok_or(CatalogError::NotFound)?;
            section_ids.push(id);
        }
        self.items
            .save_sections(item_id, &section_ids)
            .await
            .context("Failed to save item sections")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Relative items
    // ------------------------------------------------------------------

    /// Relative items of an item node, resolved to their primary tree
    /// nodes for public rendering. Relatives without a visible tree
    /// position are skipped.
    pub async fn public_relatives(&self, tree_id: i64) -> Result<Vec<CatalogNode>, CatalogError> {
        let node = self.node(tree_id).await?;
        if node.content.kind != ContentKind::Item {
            return Ok(Vec::new());
        }
        let mut resolved = Vec::new();
        for item_id in self.items.relatives(node.content.id).await? {
            let links = self
                .tree
                .links_to(ContentRef::new(ContentKind::Item, item_id))
                .await?;
            if let Some(link) = links.first() {
                if let Some(relative) = self.tree.node(link.id).await? {
                    if relative.show {
                        resolved.push(relative);
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// The relative-items editor tree for an item node: every other item
    /// in the catalog, checked when currently related.
    pub async fn relative_tree(&self, tree_id: i64) -> Result<Vec<RelativeEntry>, CatalogError> {
        let node = self.node(tree_id).await?;
        if node.content.kind != ContentKind::Item {
            return Err(CatalogError::BadArguments);
        }
        let related: HashSet<i64> = self
            .items
            .relatives(node.content.id)
            .await?
            .into_iter()
            .collect();

        let all = self.tree.all_nodes().await?;
        Ok(all
            .iter()
            .filter(|n| n.content.kind == ContentKind::Item && n.tree_id != tree_id)
            .map(|n| RelativeEntry {
                text: n.name.clone(),
                id: n.tree_id,
                leaf: true,
                checked: related.contains(&n.content.id),
            })
            .collect())
    }

    /// Save the relative set of an item node. `relative` is a
    /// comma-separated list of tree item IDs; each must resolve to an
    /// item node.
    pub async fn save_relatives(&self, tree_id: i64, relative: &str) -> Result<(), CatalogError> {
        let node = self.node(tree_id).await?;
        if node.content.kind != ContentKind::Item {
            return Err(CatalogError::BadArguments);
        }

        let mut item_ids = Vec::new();
        for id in parse_id_list(relative)? {
            let relative_node = self.node(id).await?;
            if relative_node.content.kind != ContentKind::Item {
                return Err(CatalogError::BadArguments);
            }
            item_ids.push(relative_node.content.id);
        }

        self.items
            .save_relatives(node.content.id, &item_ids)
            .await
            .context("Failed to save relative items")?;
        Ok(())
    }
}

/// Parse the `node`/`target` parameter: `root` means the root level.
fn parse_node_param(param: &str) -> Result<Option<i64>, CatalogError> {
    if param == ROOT_SENTINEL {
        return Ok(None);
    }
    param
        .trim()
        .parse::<i64>()
        .map(Some)
        .map_err(|_| CatalogError::BadArguments)
}

/// Parse a comma-separated ID list. Any non-numeric entry rejects the
/// whole list. An empty string yields an empty list.
fn parse_id_list(param: &str) -> Result<Vec<i64>, CatalogError> {
    param
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>().map_err(|_| CatalogError::BadArguments))
        .collect()
}

/// Derive a URL slug from a display name: lowercase ASCII alphanumerics,
/// with runs of anything else collapsed to single dashes.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Assemble the visible tree from the flat node list. Hidden nodes are
/// dropped together with their subtrees.
fn assemble_tree(nodes: Vec<CatalogNode>) -> Vec<TreeNode> {
    let mut by_parent: HashMap<Option<i64>, Vec<CatalogNode>> = HashMap::new();
    for node in nodes {
        if node.show {
            by_parent.entry(node.parent_id).or_default().push(node);
        }
    }

    fn build(parent: Option<i64>, by_parent: &HashMap<Option<i64>, Vec<CatalogNode>>) -> Vec<TreeNode> {
        let Some(children) = by_parent.get(&parent) else {
            return Vec::new();
        };
        children
            .iter()
            .map(|node| {
                let grandchildren = build(Some(node.tree_id), by_parent);
                TreeNode::with_children(node.clone(), grandchildren)
            })
            .collect()
    }

    build(None, &by_parent)
}
