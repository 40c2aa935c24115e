use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// ERP product template id, filled once the barcode resolves.
    pub product_id: Option<i32>,

    pub barcode: String,

    pub name: Option<String>,

    pub quantity: f64,

    /// ERP unit id. A soft reference: scans may arrive before the unit
    /// table has been synced, so no foreign key.
    pub uom_id: Option<i32>,

    /// Unit name kept denormalized so exports survive unit-table drift.
    pub uom_name: Option<String>,

    pub location_id: Option<i32>,

    pub location_name: Option<String>,

    /// draft | confirmed | posted
    pub state: String,

    pub session_id: Option<i32>,

    pub user_id: Option<i32>,

    pub document_id: Option<i32>,

    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scan_sessions::Entity",
        from = "Column::SessionId",
        to = "super::scan_sessions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ScanSessions,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::documents::Entity",
        from = "Column::DocumentId",
        to = "super::documents::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Documents,
}

impl Related<super::scan_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScanSessions.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::documents::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Documents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
