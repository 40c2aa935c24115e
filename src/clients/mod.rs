pub mod odoo;
