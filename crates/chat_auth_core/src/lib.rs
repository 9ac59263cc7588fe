pub mod claims;
pub mod domain;
pub mod error;
pub mod ports;
pub mod reconcile;

pub use claims::{validate_claims, ClaimConfig};
pub use domain::{
    ClientMeta, Conversation, NewSession, Owner, Session, Settings, User, UserIdentity,
    UserProfileUpdate,
};
pub use error::{AuthError, AuthResult};
pub use ports::{DatabaseService, IdentityProviderService, PortError, PortResult, ProviderLogin};
pub use reconcile::{
    generate_session_secret, hash_session_secret, reconcile_login, reconcile_logout,
    LoginOutcome, LogoutOutcome,
};
