pub mod document;
pub mod odoo_session;
pub mod product;
pub mod scan_session;
pub mod uom;
pub mod user;
pub mod verification;

/// Scan-session and product lifecycle states.
pub mod states {
    pub const DRAFT: &str = "draft";
    pub const CONFIRMED: &str = "confirmed";
    pub const POSTED: &str = "posted";
}

/// Local account roles. Leaders can confirm sessions; admins can reconcile,
/// verify, and run maintenance.
pub mod roles {
    pub const CHECKER: &str = "checker";
    pub const LEADER: &str = "leader";
    pub const ADMIN: &str = "admin";

    #[must_use]
    pub fn is_leader(role: &str) -> bool {
        role == LEADER || role == ADMIN
    }

    #[must_use]
    pub fn is_admin(role: &str) -> bool {
        role == ADMIN
    }
}
