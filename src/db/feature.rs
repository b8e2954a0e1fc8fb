//! Feature catalog: the static vocabulary of permissionable capabilities.
//!
//! Features form a two-level tree. Parents group children and declare no
//! actions; children declare the actions a role may be granted on them.
//! The catalog is seeded at startup and read-only afterwards.

use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::Result;

/// Feature row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Feature {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub module: String,
    pub actions: Json<Vec<String>>,
    pub sort_order: i32,
}

impl Feature {
    /// Parent features group children and carry no grantable actions.
    pub fn is_parent(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether `action` is part of this feature's vocabulary.
    pub fn allows(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }
}

/// Seed definition for one catalog entry.
#[derive(Debug, Clone, Copy)]
pub struct FeatureSeed {
    /// Low bits of the fixed identifier `10000000-0000-0000-0000-0000000000NN`.
    pub seq: u8,
    pub parent_seq: Option<u8>,
    pub name: &'static str,
    pub slug: &'static str,
    pub module: &'static str,
    pub actions: &'static [&'static str],
    pub sort_order: i32,
}

impl FeatureSeed {
    /// Fixed identifier of the seeded row.
    pub fn id(&self) -> Uuid {
        feature_id(self.seq)
    }
}

/// Identifier of a seeded catalog feature.
pub fn feature_id(seq: u8) -> Uuid {
    Uuid::from_u128(0x1000_0000_0000_0000_0000_0000_0000_0000 | seq as u128)
}

const CRUD: &[&str] = &["read", "create", "edit", "delete"];

const fn seed(
    seq: u8,
    parent_seq: Option<u8>,
    name: &'static str,
    slug: &'static str,
    module: &'static str,
    actions: &'static [&'static str],
    sort_order: i32,
) -> FeatureSeed {
    FeatureSeed {
        seq,
        parent_seq,
        name,
        slug,
        module,
        actions,
        sort_order,
    }
}

/// The feature catalog.
pub const FEATURE_CATALOG: &[FeatureSeed] = &[
    seed(0x01, None, "Master Data", "master-data", "master-data", &[], 1),
    seed(0x02, Some(0x01), "Product", "master-data.product", "master-data", CRUD, 1),
    seed(0x03, Some(0x01), "Category", "master-data.category", "master-data", CRUD, 2),
    seed(0x04, Some(0x01), "Unit", "master-data.unit", "master-data", CRUD, 3),
    seed(0x05, Some(0x01), "Variant", "master-data.variant", "master-data", CRUD, 4),
    seed(0x06, Some(0x01), "Warehouse", "master-data.warehouse", "master-data", CRUD, 5),
    seed(0x07, Some(0x01), "Supplier", "master-data.supplier", "master-data", CRUD, 6),
    seed(0x10, None, "Reporting", "reporting", "reporting", &[], 2),
    seed(0x11, Some(0x10), "Sales Report", "reporting.sales", "reporting", &["read"], 1),
    seed(0x20, None, "Purchase", "purchase", "purchase", &[], 3),
    seed(0x21, Some(0x20), "Purchase Product", "purchase.product", "purchase", CRUD, 1),
    seed(0x22, Some(0x20), "Purchase Order", "purchase.order", "purchase", CRUD, 2),
    seed(0x23, Some(0x20), "Delivery", "purchase.delivery", "purchase", CRUD, 3),
    seed(0x30, None, "Settings", "settings", "settings", &[], 4),
    seed(0x31, Some(0x30), "Stores", "settings.store", "settings", CRUD, 1),
    seed(0x32, Some(0x30), "Roles", "settings.role", "settings", CRUD, 2),
    seed(0x33, Some(0x30), "Users", "settings.user", "settings", &["read", "edit", "delete"], 3),
    seed(0x34, Some(0x30), "Invitations", "settings.invitation", "settings", &["read", "create", "delete"], 4),
];

/// Repository for the feature catalog.
pub struct FeatureRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> FeatureRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Insert catalog entries that are not present yet. Returns the number inserted.
    ///
    /// Entries must be ordered parents first.
    pub async fn seed(&mut self, catalog: &[FeatureSeed]) -> Result<u64> {
        let mut inserted = 0;
        for entry in catalog {
            let actions: Vec<String> = entry.actions.iter().map(|a| a.to_string()).collect();
            let result = sqlx::query(
                "INSERT OR IGNORE INTO features (id, parent_id, name, slug, module, actions, sort_order)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(entry.id())
            .bind(entry.parent_seq.map(feature_id))
            .bind(entry.name)
            .bind(entry.slug)
            .bind(entry.module)
            .bind(Json(actions))
            .bind(entry.sort_order)
            .execute(&mut *self.conn)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// List every feature, parents before children, each group by sort order.
    pub async fn list(&mut self) -> Result<Vec<Feature>> {
        let features = sqlx::query_as::<_, Feature>(
            "SELECT id, parent_id, name, slug, module, actions, sort_order
             FROM features
             ORDER BY parent_id IS NOT NULL, sort_order, slug",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(features)
    }

    /// Get a feature by ID.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Feature>> {
        let feature = sqlx::query_as::<_, Feature>(
            "SELECT id, parent_id, name, slug, module, actions, sort_order
             FROM features WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(feature)
    }

    /// Child features, the only ones that carry grantable actions.
    pub async fn list_leaves(&mut self) -> Result<Vec<Feature>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|f| !f.is_parent())
            .collect())
    }
}
