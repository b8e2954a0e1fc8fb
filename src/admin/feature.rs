//! Feature catalog as a tree.
//!
//! Nodes live in an arena keyed by feature id; parents hold the ids of
//! their children rather than the children themselves.

use std::collections::HashMap;

use uuid::Uuid;

use crate::db::{Database, Feature, FeatureRepository};
use crate::Result;

/// A feature with the ids of its children, in sort order.
#[derive(Debug, Clone)]
pub struct FeatureNode {
    pub feature: Feature,
    pub children: Vec<Uuid>,
}

/// The feature catalog arranged parent to children.
#[derive(Debug, Clone, Default)]
pub struct FeatureTree {
    nodes: HashMap<Uuid, FeatureNode>,
    roots: Vec<Uuid>,
}

impl FeatureTree {
    /// Arrange a flat feature list. Children whose parent is missing are
    /// kept in the arena but unreachable from the roots.
    pub fn build(mut features: Vec<Feature>) -> Self {
        features.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.slug.cmp(&b.slug)));

        let mut tree = FeatureTree::default();
        let mut links = Vec::new();
        for feature in features {
            match feature.parent_id {
                Some(parent) => links.push((parent, feature.id)),
                None => tree.roots.push(feature.id),
            }
            tree.nodes.insert(
                feature.id,
                FeatureNode {
                    feature,
                    children: Vec::new(),
                },
            );
        }

        for (parent, child) in links {
            if let Some(node) = tree.nodes.get_mut(&parent) {
                node.children.push(child);
            }
        }

        tree
    }

    /// Top-level features in sort order.
    pub fn roots(&self) -> impl Iterator<Item = &FeatureNode> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Children of a node in sort order.
    pub fn children<'a>(&'a self, node: &'a FeatureNode) -> impl Iterator<Item = &'a FeatureNode> {
        node.children.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn get(&self, id: Uuid) -> Option<&FeatureNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Read access to the feature catalog.
pub struct FeatureAdminService<'a> {
    db: &'a Database,
}

impl<'a> FeatureAdminService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The whole catalog as a tree.
    pub async fn tree(&self) -> Result<FeatureTree> {
        let mut conn = self.db.acquire().await?;
        let features = FeatureRepository::new(&mut conn).list().await?;
        Ok(FeatureTree::build(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{feature_id, FEATURE_CATALOG};

    #[tokio::test]
    async fn test_tree_matches_catalog() {
        let db = Database::open_in_memory().await.unwrap();
        let tree = FeatureAdminService::new(&db).tree().await.unwrap();

        assert_eq!(tree.len(), FEATURE_CATALOG.len());

        let roots: Vec<&str> = tree.roots().map(|n| n.feature.slug.as_str()).collect();
        assert_eq!(roots, vec!["master-data", "reporting", "purchase", "settings"]);

        for root in tree.roots() {
            assert!(root.feature.actions.is_empty());
            let expected = FEATURE_CATALOG
                .iter()
                .filter(|s| s.parent_seq.map(feature_id) == Some(root.feature.id))
                .count();
            assert_eq!(root.children.len(), expected, "{}", root.feature.slug);
            for child in tree.children(root) {
                assert_eq!(child.feature.parent_id, Some(root.feature.id));
                assert!(!child.feature.actions.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn test_children_in_sort_order() {
        let db = Database::open_in_memory().await.unwrap();
        let tree = FeatureAdminService::new(&db).tree().await.unwrap();

        let settings = tree.get(feature_id(0x30)).unwrap();
        let slugs: Vec<&str> = tree
            .children(settings)
            .map(|n| n.feature.slug.as_str())
            .collect();
        assert_eq!(
            slugs,
            vec![
                "settings.store",
                "settings.role",
                "settings.user",
                "settings.invitation"
            ]
        );
    }

    #[test]
    fn test_orphan_is_unreachable() {
        let orphan = Feature {
            id: Uuid::new_v4(),
            parent_id: Some(Uuid::new_v4()),
            name: "Orphan".to_string(),
            slug: "orphan".to_string(),
            module: "x".to_string(),
            actions: sqlx::types::Json(vec!["read".to_string()]),
            sort_order: 1,
        };
        let tree = FeatureTree::build(vec![orphan]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.roots().count(), 0);
    }
}
