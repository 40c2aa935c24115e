use sea_orm::entity::prelude::*;

/// Local copy of an admin verification entry. The ERP line id is the join
/// key back into the ERP's inventory document.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "verification_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub odoo_line_id: i32,

    pub qty: f64,

    pub location_id: Option<i32>,

    pub location_name: Option<String>,

    pub verifier_id: Option<i32>,

    pub verifier_name: Option<String>,

    pub note: Option<String>,

    /// Local user who recorded the entry.
    pub user_id: Option<i32>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
