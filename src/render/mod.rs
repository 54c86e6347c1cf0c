//! Template rendering
//!
//! Tera-based rendering for public catalog pages and the admin console.
//! Default templates are embedded in the binary; a template of the same
//! name in the configured templates directory shadows the embedded one,
//! so deployments can restyle pages without rebuilding.

use anyhow::{Context as AnyhowContext, Result};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tera::{Context, Tera};

use crate::models::{CatalogNode, TreeItemImage, TreeNode};

/// Embedded default templates
#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "**/*.html"]
struct EmbeddedTemplates;

/// How the public tree menu is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMode {
    /// Every branch open
    Expanded,
    /// Root level only
    #[default]
    Collapsed,
    /// Only the path to the active node open
    Drilldown,
}

impl FromStr for TreeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "expanded" => Ok(TreeMode::Expanded),
            "collapsed" => Ok(TreeMode::Collapsed),
            "drilldown" => Ok(TreeMode::Drilldown),
            other => Err(anyhow::anyhow!("Unknown tree mode: {}", other)),
        }
    }
}

/// One entry of the rendered menu tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    pub name: String,
    pub url: String,
    pub id: i64,
    /// Node is on the path to (or is) the current page
    pub active: bool,
    /// Children are rendered
    pub expanded: bool,
    pub children: Vec<MenuEntry>,
}

/// Build the menu from the visible tree for a given mode.
///
/// `active_path` is the breadcrumb chain of the current page plus the
/// page itself (tree IDs); it controls `active` flags and, in drilldown
/// mode, which branches open.
pub fn build_menu(tree: &[TreeNode], mode: TreeMode, active_path: &[i64]) -> Vec<MenuEntry> {
    tree.iter()
        .map(|node| {
            let active = active_path.contains(&node.node.tree_id);
            let expanded = match mode {
                TreeMode::Expanded => true,
                TreeMode::Collapsed => false,
                TreeMode::Drilldown => active,
            };
            MenuEntry {
                name: node.node.name.clone(),
                url: node.node.url(),
                id: node.node.tree_id,
                active,
                expanded,
                children: if expanded {
                    build_menu(&node.children, mode, active_path)
                } else {
                    Vec::new()
                },
            }
        })
        .collect()
}

/// Template engine wrapping Tera
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Create an engine with the embedded templates, shadowed by any
    /// same-named templates in `override_dir`.
    pub fn new(override_dir: &Path) -> Result<Self> {
        let mut sources: Vec<(String, String)> = Vec::new();

        for name in EmbeddedTemplates::iter() {
            let file = EmbeddedTemplates::get(&name)
                .ok_or_else(|| anyhow::anyhow!("Missing embedded template: {}", name))?;
            let content = std::str::from_utf8(file.data.as_ref())
                .with_context(|| format!("Embedded template is not UTF-8: {}", name))?;
            sources.push((name.to_string(), content.to_string()));
        }

        for (name, content) in collect_overrides(override_dir)? {
            match sources.iter_mut().find(|(existing, _)| *existing == name) {
                Some(entry) => entry.1 = content,
                None => sources.push((name, content)),
            }
        }

        // Templates import each other, so they must be registered in one
        // batch; Tera resolves the references after loading.
        let mut tera = Tera::default();
        tera.add_raw_templates(sources)
            .context("Failed to parse templates")?;

        Ok(Self { tera })
    }

    /// Render the home page: root-level visible nodes.
    pub fn home_page(&self, children: &[CatalogNode], menu: &[MenuEntry]) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("children", children);
        ctx.insert("menu", menu);
        self.render("home.html", &ctx)
    }

    /// Render a public section page.
    pub fn section_page(
        &self,
        node: &CatalogNode,
        children: &[CatalogNode],
        breadcrumbs: &[CatalogNode],
        menu: &[MenuEntry],
    ) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("node", node);
        ctx.insert("children", children);
        ctx.insert("breadcrumbs", breadcrumbs);
        ctx.insert("menu", menu);
        self.render("section.html", &ctx)
    }

    /// Render a public item page.
    pub fn item_page(
        &self,
        node: &CatalogNode,
        breadcrumbs: &[CatalogNode],
        relatives: &[CatalogNode],
        images: &[TreeItemImage],
        menu: &[MenuEntry],
    ) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("node", node);
        ctx.insert("breadcrumbs", breadcrumbs);
        ctx.insert("relatives", relatives);
        ctx.insert("images", images);
        ctx.insert("menu", menu);
        self.render("item.html", &ctx)
    }

    /// Render the children fragment used by the inline children tag.
    pub fn children_fragment(&self, children: &[CatalogNode]) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("children", children);
        self.render("children.html", &ctx)
    }

    /// Render the admin console page.
    pub fn admin_console(&self) -> Result<String> {
        self.render("admin/console.html", &Context::new())
    }

    /// Render the plain admin changelist.
    pub fn admin_changelist(&self, rows: &[crate::services::GridRow]) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("rows", rows);
        self.render("admin/changelist.html", &ctx)
    }

    /// Render the admin move form.
    pub fn admin_move_form(&self, node: &CatalogNode, targets: &[CatalogNode]) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("node", node);
        ctx.insert("targets", targets);
        self.render("admin/move_form.html", &ctx)
    }

    /// Render the admin link form.
    pub fn admin_link_form(&self, node: &CatalogNode, targets: &[CatalogNode]) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("node", node);
        ctx.insert("targets", targets);
        self.render("admin/link_form.html", &ctx)
    }

    /// Render the admin login form.
    pub fn admin_login(&self, error: Option<&str>) -> Result<String> {
        let mut ctx = Context::new();
        ctx.insert("error", &error);
        self.render("admin/login.html", &ctx)
    }

    fn render(&self, template: &str, ctx: &Context) -> Result<String> {
        self.tera
            .render(template, ctx)
            .with_context(|| format!("Failed to render template: {}", template))
    }
}

/// Collect `.html` files under the override directory, named relative to
/// it with `/` separators so they shadow embedded templates by name.
fn collect_overrides(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut found = Vec::new();
    if dir.is_dir() {
        collect_dir(dir, dir, &mut found)?;
    }
    Ok(found)
}

fn collect_dir(root: &Path, dir: &Path, found: &mut Vec<(String, String)>) -> Result<()> {
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read template dir {:?}", dir))?
    {
        let path = entry?.path();
        if path.is_dir() {
            collect_dir(root, &path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let name = path
                .strip_prefix(root)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template override {:?}", path))?;
            found.push((name, content));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentKind, ContentRef};

    fn node(id: i64, kind: ContentKind, name: &str) -> CatalogNode {
        CatalogNode {
            tree_id: id,
            parent_id: None,
            sort_order: 0,
            show: true,
            slug: name.to_lowercase(),
            content: ContentRef::new(kind, id),
            name: name.to_string(),
            description: Some(format!("About {}", name)),
            price: None,
            quantity: None,
            leaf: kind == ContentKind::Item,
            has_image: false,
        }
    }

    fn sample_tree() -> Vec<TreeNode> {
        vec![TreeNode::with_children(
            node(1, ContentKind::Section, "Tools"),
            vec![
                TreeNode::new(node(2, ContentKind::Item, "Hammer")),
                TreeNode::with_children(
                    node(3, ContentKind::Section, "Drills"),
                    vec![TreeNode::new(node(4, ContentKind::Item, "Impact"))],
                ),
            ],
        )]
    }

    #[test]
    fn test_tree_mode_parse() {
        assert_eq!("expanded".parse::<TreeMode>().unwrap(), TreeMode::Expanded);
        assert_eq!("collapsed".parse::<TreeMode>().unwrap(), TreeMode::Collapsed);
        assert_eq!("drilldown".parse::<TreeMode>().unwrap(), TreeMode::Drilldown);
        assert!("open".parse::<TreeMode>().is_err());
    }

    #[test]
    fn test_build_menu_expanded() {
        let menu = build_menu(&sample_tree(), TreeMode::Expanded, &[]);
        assert_eq!(menu.len(), 1);
        assert!(menu[0].expanded);
        assert_eq!(menu[0].children.len(), 2);
        assert_eq!(menu[0].children[1].children.len(), 1);
    }

    #[test]
    fn test_build_menu_collapsed() {
        let menu = build_menu(&sample_tree(), TreeMode::Collapsed, &[1, 3, 4]);
        assert_eq!(menu.len(), 1);
        assert!(menu[0].active);
        assert!(!menu[0].expanded);
        assert!(menu[0].children.is_empty());
    }

    #[test]
    fn test_build_menu_drilldown_opens_active_path() {
        let menu = build_menu(&sample_tree(), TreeMode::Drilldown, &[1, 3, 4]);
        let root = &menu[0];
        assert!(root.expanded);

        let hammer = &root.children[0];
        assert!(!hammer.active);
        assert!(!hammer.expanded);

        let drills = &root.children[1];
        assert!(drills.active && drills.expanded);
        assert_eq!(drills.children.len(), 1);
        assert!(drills.children[0].active);
    }

    #[test]
    fn test_menu_entry_url() {
        let menu = build_menu(&sample_tree(), TreeMode::Expanded, &[]);
        assert_eq!(menu[0].url, "/tools-1");
    }

    #[test]
    fn test_engine_renders_embedded_templates() {
        let engine = TemplateEngine::new(Path::new("/nonexistent")).unwrap();
        let section = node(1, ContentKind::Section, "Tools");
        let child = node(2, ContentKind::Item, "Hammer");
        let menu = build_menu(&sample_tree(), TreeMode::Collapsed, &[1]);

        let html = engine
            .section_page(&section, &[child.clone()], &[], &menu)
            .unwrap();
        assert!(html.contains("Tools"));
        assert!(html.contains("/hammer-2"));

        let images = vec![TreeItemImage::new(
            ContentRef::new(ContentKind::Item, 2),
            "catalog/2/front.jpg".to_string(),
            false,
        )];
        let html = engine.item_page(&child, &[section], &[], &images, &menu).unwrap();
        assert!(html.contains("Hammer"));
        assert!(html.contains("/media/catalog/2/front.jpg"));

        let html = engine.children_fragment(&[child]).unwrap();
        assert!(html.contains("Hammer"));
    }

    #[test]
    fn test_engine_renders_admin_templates() {
        let engine = TemplateEngine::new(Path::new("/nonexistent")).unwrap();
        assert!(engine.admin_console().is_ok());
        assert!(engine.admin_login(Some("Invalid credentials")).is_ok());

        let section = node(1, ContentKind::Section, "Tools");
        let html = engine.admin_move_form(&section, &[]).unwrap();
        assert!(html.contains("Tools"));
    }

    #[test]
    fn test_overrides_shadow_embedded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("children.html"), "override {{ children | length }}").unwrap();

        let engine = TemplateEngine::new(dir.path()).unwrap();
        let html = engine.children_fragment(&[]).unwrap();
        assert_eq!(html, "override 0");
    }

    #[test]
    fn test_overrides_shadow_nested_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("admin")).unwrap();
        std::fs::write(dir.path().join("admin/console.html"), "console override").unwrap();

        let engine = TemplateEngine::new(dir.path()).unwrap();
        assert_eq!(engine.admin_console().unwrap(), "console override");
        // Embedded templates outside the override set still render
        assert!(engine.admin_login(None).is_ok());
    }

    #[test]
    fn test_overrides_may_import_embedded_macros() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("children.html"),
            r#"{% import "macros.html" as macros %}{% for child in children %}{{ macros::node_url(node=child) }}{% endfor %}"#,
        )
        .unwrap();

        let engine = TemplateEngine::new(dir.path()).unwrap();
        let child = node(2, ContentKind::Item, "Hammer");
        assert_eq!(engine.children_fragment(&[child]).unwrap(), "/hammer-2");
    }
}
