//! Authentication: sessions, guards, login and logout.
//!
//! Sessions are server-side records referenced by a signed cookie. Guards
//! resolve the session (and the user it points at) once per request and hand
//! the resulting [`RequestContext`] to the handler.

mod context;
mod error;
mod guard;
pub(crate) mod login;
pub(crate) mod session;

pub use context::RequestContext;
pub use error::{AuthError, REGISTRATION_FAILED};
pub use guard::{require_authenticated, require_not_authenticated};
pub use login::{authenticate, LoginForm};
pub use session::{Session, SessionManager, SESSION_COOKIE_NAME};
