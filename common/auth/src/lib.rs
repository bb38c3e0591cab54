pub mod bypass;
pub mod claims;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gate;
pub mod jwks;
pub mod roles;
pub mod verifier;

pub use bypass::DevBypass;
pub use claims::{Claims, ClaimsDecoder, CredentialParts};
pub use config::{AuthConfig, Environment};
pub use credentials::{Credential, CredentialExtractor, CredentialSource};
pub use error::{AuthError, AuthResult, CredentialError, MalformedReason};
pub use gate::{AuthenticatedUser, AuthorizationGate, AuthzVerdict, ReasonCode};
pub use jwks::JwksFetcher;
pub use roles::Role;
pub use verifier::{
    InMemoryKeyStore, JwtSignatureVerifier, JwtSignatureVerifierBuilder, KeyFamily,
    SignatureVerifier,
};
