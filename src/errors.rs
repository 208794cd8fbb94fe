use thiserror::Error;

/// AuthError
///
/// The complete error taxonomy for the authentication and authorization core.
/// Session operations (sign-in, sign-up, sign-out) surface these to the calling
/// page-level form **unchanged**; the `AuthContext` is a transparent pass-through
/// and never swallows them.
///
/// `RoleLookupFailed` deserves a note: authorization checks are fail-closed, so a
/// failed lookup still denies admin access, but the failure stays distinguishable
/// from a genuine "not admin" answer so the UI can offer a retry instead of a
/// permanent denial.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The backend rejected the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Sign-up succeeded but the account requires email confirmation before a
    /// session exists. Not a failure of the request itself: the form reacts by
    /// telling the user to check their inbox.
    #[error("account created; email confirmation required before sign-in")]
    PendingConfirmation,

    /// The backend could not be reached, or answered with a transport-level error.
    #[error("network error: {0}")]
    Network(String),

    /// The role directory lookup failed. The admin check treats this as "not
    /// admin" (fail-closed) while keeping the cause observable.
    #[error("role lookup failed: {0}")]
    RoleLookupFailed(String),

    /// An operation that requires a signed-in user was attempted without one.
    #[error("not authenticated")]
    NotAuthenticated,
}
