pub use super::documents::Entity as Documents;
pub use super::odoo_sessions::Entity as OdooSessions;
pub use super::products::Entity as Products;
pub use super::scan_sessions::Entity as ScanSessions;
pub use super::uoms::Entity as Uoms;
pub use super::users::Entity as Users;
pub use super::verification_results::Entity as VerificationResults;
