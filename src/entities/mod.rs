pub mod prelude;

pub mod documents;
pub mod odoo_sessions;
pub mod products;
pub mod scan_sessions;
pub mod uoms;
pub mod users;
pub mod verification_results;
