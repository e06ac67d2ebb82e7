use crate::error::BridgeError;
use crate::session::Session;

/// Fast, descriptive rejection of privileged calls on an unauthenticated
/// session. Advisory only: the backend still enforces its own rules.
pub fn require_admin(session: &Session, action: &str) -> Result<(), BridgeError> {
    if session.is_authenticated() {
        return Ok(());
    }
    Err(match session.auth_failure() {
        Some(reason) => BridgeError::credentials_rejected(action, &reason),
        None => BridgeError::unauthenticated(action),
    })
}
