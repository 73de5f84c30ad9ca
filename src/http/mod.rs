//! HTTP surface: routes, verification collaborators, and the server
//! wrapper. Routing and request parsing live here, outside the admission
//! core.

mod handlers;
mod server;
mod verify;

pub use handlers::AppState;
pub use server::HttpServer;
pub use verify::{
    build_identity_provider, build_verifier, DiscordIdentityProvider, HumanVerifier, Identity,
    IdentityProvider, PermissiveVerifier, RecaptchaVerifier, TokenIdentityProvider,
};
