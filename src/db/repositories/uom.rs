use anyhow::{Context, Result};
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::entities::uoms;
use crate::uom::{Uom, UomKind};

impl From<uoms::Model> for Uom {
    fn from(model: uoms::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            category_id: model.category_id,
            kind: UomKind::parse(&model.uom_type),
            factor: model.factor,
            factor_inv: model.factor_inv,
        }
    }
}

/// One unit as synced from the ERP.
#[derive(Debug, Clone)]
pub struct UomSync {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
    pub uom_type: String,
    pub factor: f64,
    pub factor_inv: f64,
}

pub struct UomRepository {
    conn: DatabaseConnection,
}

impl UomRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn list(&self) -> Result<Vec<Uom>> {
        let rows = uoms::Entity::find()
            .order_by_asc(uoms::Column::CategoryId)
            .order_by_asc(uoms::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list units of measure")?;

        Ok(rows.into_iter().map(Uom::from).collect())
    }

    /// Upsert the ERP's unit table wholesale; ids are the ERP's.
    pub async fn upsert_many(&self, units: Vec<UomSync>) -> Result<usize> {
        let count = units.len();

        for unit in units {
            let model = uoms::ActiveModel {
                id: Set(unit.id),
                name: Set(unit.name),
                category_id: Set(unit.category_id),
                uom_type: Set(unit.uom_type),
                factor: Set(unit.factor),
                factor_inv: Set(unit.factor_inv),
            };

            uoms::Entity::insert(model)
                .on_conflict(
                    sea_orm::sea_query::OnConflict::column(uoms::Column::Id)
                        .update_columns([
                            uoms::Column::Name,
                            uoms::Column::CategoryId,
                            uoms::Column::UomType,
                            uoms::Column::Factor,
                            uoms::Column::FactorInv,
                        ])
                        .to_owned(),
                )
                .exec(&self.conn)
                .await
                .context("Failed to upsert unit of measure")?;
        }

        Ok(count)
    }
}
