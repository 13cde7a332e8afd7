//! Terminal rendition of the connection UI

pub mod navbar;

pub use navbar::{NavLink, Navbar, NavbarConfig, NavbarView, Provider, WalletArea};
