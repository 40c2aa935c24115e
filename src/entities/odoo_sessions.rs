use sea_orm::entity::prelude::*;

/// One cached, encrypted ERP login per local user. At most one row per user
/// may be active at a time; a partial unique index in the migration enforces
/// it at the database level.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "odoo_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub user_id: i32,

    pub email: String,

    /// Base64 ChaCha20-Poly1305 ciphertext of the serialized credentials.
    pub cipher_text: String,

    /// Base64 per-encryption random nonce.
    pub nonce: String,

    /// Base64 authentication tag, verified on every decrypt.
    pub auth_tag: String,

    /// Id of the encryption key that sealed this record.
    pub key_id: String,

    pub is_active: bool,

    pub expires_at: String,

    pub created_at: String,

    pub updated_at: String,
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
