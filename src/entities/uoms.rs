use sea_orm::entity::prelude::*;

/// Mirror of the ERP unit-of-measure table, synced on demand.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "uoms")]
pub struct Model {
    /// ERP uom id.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub name: String,

    pub category_id: i32,

    /// reference | bigger | smaller
    pub uom_type: String,

    pub factor: f64,

    pub factor_inv: f64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
