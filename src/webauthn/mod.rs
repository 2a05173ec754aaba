pub mod abort;
pub mod attestation;
pub mod authenticator;
pub mod authenticator_data;
pub(crate) mod get_assertion;
pub(crate) mod make_credential;
pub mod resolver;
pub mod types;

pub use abort::AbortToken;
pub use attestation::{AssertionResult, Ceremony, ClientData};
pub use authenticator::{Authenticator, AuthenticatorOptions};
pub use authenticator_data::{AuthenticatorData, AuthenticatorDataFlags};
pub use resolver::{CredentialResolver, StoredCredential};
pub use types::{
    AttestationFormat, AuthenticatorError, CredentialDescriptor, GetAssertionParams,
    MakeCredentialParams, PublicKeyAlgorithm, RelyingParty, UserEntity,
};
