pub mod db;
pub mod oidc;

pub use db::DbAdapter;
pub use oidc::OidcAdapter;
