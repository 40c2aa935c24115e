use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// The ERP user id; accounts are provisioned against the ERP, so the
    /// local table reuses its identifiers.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub email: String,

    /// Argon2id password hash
    pub password_hash: String,

    /// checker | leader | admin
    pub role: String,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::scan_sessions::Entity")]
    ScanSessions,
    #[sea_orm(has_many = "super::products::Entity")]
    Products,
    #[sea_orm(has_many = "super::odoo_sessions::Entity")]
    OdooSessions,
}

impl Related<super::scan_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScanSessions.def()
    }
}

impl Related<super::products::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::odoo_sessions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OdooSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
