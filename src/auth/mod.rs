/// Authentication module
///
/// Session token issuance and refresh, the token codec, the refresh cookie
/// and password hashing.

mod claims;
mod clock;
mod cookie;
mod jwt;
mod password;
mod session;

pub use claims::{AccessClaims, RefreshClaims, UserInfo};
pub use clock::{Clock, ManualClock, SystemClock};
pub use cookie::{clear_refresh_cookie, extract_refresh_token, refresh_cookie, REFRESH_COOKIE_NAME};
pub use jwt::TokenCodec;
pub use password::{BcryptHasher, CredentialVerifier};
pub use session::{LogoutOutcome, SessionService, SessionTokens};
