//! Identity verification for GetIT requests.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod request_context;

pub use principal::{InvalidUserId, Principal, UserId, MAX_USER_ID_LEN};
pub use session::{Session, SessionManager, SessionToken};
pub use provider::{bearer_token, load_tokens_file, IdentityService, IdentityVerifier, TokenIdentity, VerifyError, BEARER_PREFIX};
pub use request_context::RequestContext;
