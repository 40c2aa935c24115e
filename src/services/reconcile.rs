//! Reconciliation of confirmed scan lines into ERP inventory adjustments.
//!
//! Confirmed lines are grouped per warehouse and product, consolidated by
//! barcode, normalized to a single unit per product (the smallest unit seen
//! when scanners disagreed), and posted to the ERP in bulk. Sessions whose
//! lines are all posted are closed.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::{info, warn};

use crate::clients::odoo::{OdooClient, OdooError};
use crate::db::{Store, states};
use crate::entities::{products, scan_sessions};
use crate::uom::{self, Uom, UomKind};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Erp(#[from] OdooError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// One consolidated product within a warehouse group.
#[derive(Debug, Clone, Serialize)]
pub struct UnpostedLine {
    pub product_id: Option<i32>,
    pub barcode: String,
    pub name: Option<String>,
    pub qty: f64,
    pub uom_id: Option<i32>,
    pub uom_name: Option<String>,
    /// True when source lines disagreed on the unit and quantities were
    /// normalized to the elected target unit.
    pub needs_conversion: bool,
    /// Ids of the local scan lines rolled into this one.
    pub line_ids: Vec<i32>,
    /// Sessions contributing to this line, for closing them after posting.
    pub session_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnpostedGroup {
    /// ERP stock location id the sessions were scanned against.
    pub warehouse_id: i32,
    pub warehouse_name: Option<String>,
    pub lines: Vec<UnpostedLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostedDocument {
    pub document_id: i32,
    pub name: String,
    pub inventory_id: Option<i32>,
    pub lines: usize,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PostReport {
    pub documents: Vec<PostedDocument>,
    pub posted_lines: usize,
    pub skipped_lines: usize,
    pub closed_sessions: usize,
    pub errors: Vec<String>,
}

/// Inventory name in the warehouse's format: `CODE/DDMMYY-HHMM`.
#[must_use]
pub fn generate_inventory_name(warehouse_code: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}/{}", warehouse_code, now.format("%d%m%y-%H%M"))
}

/// Group confirmed lines by warehouse and product, electing one target unit
/// per product and converting quantities into it. Pure so the election and
/// conversion rules are testable without a database.
#[must_use]
pub fn group_unposted(
    rows: &[(products::Model, Option<scan_sessions::Model>)],
    uoms: &[Uom],
) -> Vec<UnpostedGroup> {
    let by_id: HashMap<i32, &Uom> = uoms.iter().map(|u| (u.id, u)).collect();
    let categories = uom::group_by_category(uoms);

    // BTreeMap keeps group and line order deterministic.
    let mut buckets: BTreeMap<(i32, String), Vec<&(products::Model, Option<scan_sessions::Model>)>> =
        BTreeMap::new();
    let mut warehouse_names: HashMap<i32, String> = HashMap::new();

    for row in rows {
        let (product, session) = row;
        let warehouse_id = session.as_ref().and_then(|s| s.warehouse_id).unwrap_or(0);
        if let Some(name) = session.as_ref().and_then(|s| s.warehouse_name.clone()) {
            warehouse_names.entry(warehouse_id).or_insert(name);
        }

        // Drop the location from the key so scans of the same product from
        // different spots in the warehouse merge into one line.
        let product_key = product.product_id.map_or_else(
            || format!("barcode:{}", product.barcode),
            |id| format!("product:{id}"),
        );

        buckets
            .entry((warehouse_id, product_key))
            .or_default()
            .push(row);
    }

    let mut groups: BTreeMap<i32, UnpostedGroup> = BTreeMap::new();

    for ((warehouse_id, _), lines) in buckets {
        let distinct_uoms: Vec<&Uom> = {
            let mut seen = BTreeSet::new();
            lines
                .iter()
                .filter_map(|(p, _)| p.uom_id)
                .filter(|id| seen.insert(*id))
                .filter_map(|id| by_id.get(&id).copied())
                .collect()
        };

        // Elect a target unit: the one unit in use, or the smallest unit
        // present when scanners disagreed.
        let (target, needs_conversion) = if distinct_uoms.len() <= 1 {
            (distinct_uoms.first().copied(), false)
        } else {
            let preferred = distinct_uoms
                .iter()
                .find(|u| matches!(u.kind, Some(UomKind::Smaller) | Some(UomKind::Reference)))
                .copied()
                .or_else(|| distinct_uoms.first().copied());
            (preferred, true)
        };

        let mut qty = 0.0;
        let mut line_ids = Vec::new();
        let mut session_ids = BTreeSet::new();

        for (product, _) in &lines {
            let converted = match (product.uom_id.and_then(|id| by_id.get(&id).copied()), target) {
                (Some(from), Some(to)) => {
                    let reference = categories
                        .get(&to.category_id)
                        .and_then(|c| c.reference.as_ref());
                    uom::convert_to_target(product.quantity, from, to, reference)
                }
                _ => product.quantity,
            };

            qty += converted;
            line_ids.push(product.id);
            if let Some(session_id) = product.session_id {
                session_ids.insert(session_id);
            }
        }

        let first = &lines[0].0;
        let line = UnpostedLine {
            product_id: first.product_id,
            barcode: first.barcode.clone(),
            name: first.name.clone(),
            qty,
            uom_id: target.map(|u| u.id).or(first.uom_id),
            uom_name: target
                .map(|u| u.name.clone())
                .or_else(|| first.uom_name.clone()),
            needs_conversion,
            line_ids,
            session_ids: session_ids.into_iter().collect(),
        };

        groups
            .entry(warehouse_id)
            .or_insert_with(|| UnpostedGroup {
                warehouse_id,
                warehouse_name: warehouse_names.get(&warehouse_id).cloned(),
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    groups.into_values().collect()
}

pub struct ReconcileService {
    store: Store,
    max_post_lines: usize,
}

impl ReconcileService {
    #[must_use]
    pub const fn new(store: Store, max_post_lines: usize) -> Self {
        Self {
            store,
            max_post_lines,
        }
    }

    pub async fn unposted(&self) -> Result<Vec<UnpostedGroup>> {
        let rows = self.store.confirmed_products_with_sessions().await?;
        let uoms = self.store.list_uoms().await?;
        Ok(group_unposted(&rows, &uoms))
    }

    /// Post every unposted group as a bulk inventory adjustment. Groups that
    /// cannot be posted (no warehouse, unknown warehouse) are reported, not
    /// fatal; ERP transport failures abort.
    pub async fn post(
        &self,
        odoo: &OdooClient,
        user_id: i32,
    ) -> Result<PostReport, ReconcileError> {
        let groups = self.unposted().await?;
        let mut report = PostReport::default();
        let mut touched_sessions: BTreeSet<i32> = BTreeSet::new();

        for group in groups {
            if group.warehouse_id == 0 {
                report.errors.push(format!(
                    "{} line(s) skipped: session has no warehouse",
                    group.lines.len()
                ));
                report.skipped_lines += group.lines.len();
                continue;
            }

            let Some(warehouse) = odoo
                .warehouse_by_stock_location(i64::from(group.warehouse_id))
                .await?
            else {
                warn!(warehouse_id = group.warehouse_id, "Warehouse not found in ERP");
                report.errors.push(format!(
                    "warehouse {} not found in ERP",
                    group.warehouse_id
                ));
                report.skipped_lines += group.lines.len();
                continue;
            };

            let (postable, unresolved): (Vec<_>, Vec<_>) = group
                .lines
                .into_iter()
                .partition(|l| l.product_id.is_some());

            if !unresolved.is_empty() {
                report.errors.push(format!(
                    "{} line(s) skipped in {}: barcode never resolved to an ERP product",
                    unresolved.len(),
                    warehouse.code
                ));
                report.skipped_lines += unresolved.len();
            }

            for chunk in postable.chunks(self.max_post_lines) {
                let now = chrono::Utc::now();
                let name = generate_inventory_name(&warehouse.code, now);

                let line_ids: Vec<Value> = chunk
                    .iter()
                    .map(|line| {
                        json!({
                            "product_tmpl_id": line.product_id,
                            "product_uom_id": line.uom_id,
                            "product_qty": line.qty,
                            "location_id": group.warehouse_id,
                        })
                    })
                    .collect();

                let payload = json!({
                    "name": name,
                    "location_id": group.warehouse_id,
                    "date": now.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "line_ids": line_ids,
                });

                let result = odoo.create_bulk_inventory(payload).await?;

                let document = self
                    .store
                    .create_document(
                        result.name.as_deref().unwrap_or(&name),
                        result.inventory_id.map(|id| id as i32),
                        states::POSTED,
                        Some(user_id),
                    )
                    .await?;

                let posted_ids: Vec<i32> =
                    chunk.iter().flat_map(|l| l.line_ids.clone()).collect();
                self.store
                    .mark_products_posted(&posted_ids, document.id)
                    .await?;

                touched_sessions.extend(chunk.iter().flat_map(|l| l.session_ids.clone()));

                info!(
                    document = %document.name,
                    lines = chunk.len(),
                    "Posted inventory adjustment to ERP"
                );

                report.posted_lines += chunk.len();
                report.documents.push(PostedDocument {
                    document_id: document.id,
                    name: document.name,
                    inventory_id: document.inventory_id,
                    lines: chunk.len(),
                });
            }
        }

        for session_id in touched_sessions {
            if !self.store.session_has_unposted_products(session_id).await? {
                self.store
                    .set_scan_session_state(session_id, states::POSTED)
                    .await?;
                report.closed_sessions += 1;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uom(id: i32, kind: Option<UomKind>, factor: f64, factor_inv: f64) -> Uom {
        Uom {
            id,
            name: format!("uom-{id}"),
            category_id: 7,
            kind,
            factor,
            factor_inv,
        }
    }

    fn session(id: i32, warehouse_id: Option<i32>) -> scan_sessions::Model {
        scan_sessions::Model {
            id,
            name: format!("Session {id}"),
            user_id: 1,
            warehouse_id,
            warehouse_name: warehouse_id.map(|w| format!("Warehouse {w}")),
            state: states::CONFIRMED.to_string(),
            created_at: "2026-08-06T00:00:00+00:00".to_string(),
            updated_at: "2026-08-06T00:00:00+00:00".to_string(),
        }
    }

    fn line(
        id: i32,
        product_id: Option<i32>,
        barcode: &str,
        quantity: f64,
        uom_id: Option<i32>,
        session_id: i32,
    ) -> products::Model {
        products::Model {
            id,
            product_id,
            barcode: barcode.to_string(),
            name: Some(format!("Product {barcode}")),
            quantity,
            uom_id,
            uom_name: None,
            location_id: None,
            location_name: None,
            state: states::CONFIRMED.to_string(),
            session_id: Some(session_id),
            user_id: Some(1),
            document_id: None,
            created_at: "2026-08-06T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn same_barcode_in_one_warehouse_is_consolidated() {
        let s = session(1, Some(544));
        let rows = vec![
            (line(1, Some(100), "111", 2.0, Some(61), 1), Some(s.clone())),
            (line(2, Some(100), "111", 3.0, Some(61), 1), Some(s)),
        ];
        let uoms = vec![uom(61, Some(UomKind::Reference), 1.0, 1.0)];

        let groups = group_unposted(&rows, &uoms);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].warehouse_id, 544);
        assert_eq!(groups[0].lines.len(), 1);

        let merged = &groups[0].lines[0];
        assert!((merged.qty - 5.0).abs() < 1e-9);
        assert_eq!(merged.line_ids, vec![1, 2]);
        assert!(!merged.needs_conversion);
    }

    #[test]
    fn different_warehouses_stay_separate() {
        let rows = vec![
            (
                line(1, Some(100), "111", 2.0, None, 1),
                Some(session(1, Some(544))),
            ),
            (
                line(2, Some(100), "111", 3.0, None, 2),
                Some(session(2, Some(545))),
            ),
        ];

        let groups = group_unposted(&rows, &[]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].warehouse_id, 544);
        assert_eq!(groups[1].warehouse_id, 545);
    }

    #[test]
    fn mixed_units_elect_the_smaller_and_convert() {
        let s = session(1, Some(544));
        // 2 dozen + 3 pieces: the piece unit wins, 2 dozen converts to 24.
        let rows = vec![
            (line(1, Some(100), "111", 2.0, Some(62), 1), Some(s.clone())),
            (line(2, Some(100), "111", 3.0, Some(63), 1), Some(s)),
        ];
        let uoms = vec![
            uom(61, Some(UomKind::Reference), 1.0, 1.0),
            uom(62, Some(UomKind::Bigger), 0.083, 12.0),
            uom(63, Some(UomKind::Smaller), 1.0, 1.0),
        ];

        let groups = group_unposted(&rows, &uoms);
        let merged = &groups[0].lines[0];

        assert!(merged.needs_conversion);
        assert_eq!(merged.uom_id, Some(63));
        assert!((merged.qty - 27.0).abs() < 1e-9);
    }

    #[test]
    fn lines_without_session_fall_into_the_zero_warehouse_group() {
        let rows = vec![(line(1, Some(100), "111", 1.0, None, 9), None)];

        let groups = group_unposted(&rows, &[]);
        assert_eq!(groups[0].warehouse_id, 0);
    }

    #[test]
    fn products_without_erp_id_group_by_barcode() {
        let s = session(1, Some(544));
        let rows = vec![
            (line(1, None, "111", 1.0, None, 1), Some(s.clone())),
            (line(2, None, "111", 2.0, None, 1), Some(s.clone())),
            (line(3, None, "222", 4.0, None, 1), Some(s)),
        ];

        let groups = group_unposted(&rows, &[]);
        assert_eq!(groups[0].lines.len(), 2);
        let by_barcode: Vec<_> = groups[0].lines.iter().map(|l| l.barcode.as_str()).collect();
        assert!(by_barcode.contains(&"111"));
        assert!(by_barcode.contains(&"222"));
    }

    #[test]
    fn inventory_name_has_warehouse_code_and_timestamp() {
        let at = chrono::DateTime::parse_from_rfc3339("2026-08-06T14:30:00+00:00")
            .unwrap()
            .with_timezone(&chrono::Utc);

        assert_eq!(generate_inventory_name("TKJS", at), "TKJS/060826-1430");
    }
}
