// Public API - what other modules can use
pub use identity::{ClaimsIdentityResolver, IdentityResolver, InMemoryIdentityStore};
pub use token::TokenConfig;
pub use types::{Identity, LookupError, TokenClaims, TokenError};

// Internal modules
mod identity;
mod token;
mod types;
