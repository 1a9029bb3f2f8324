mod oauth_state;

pub use oauth_state::{OAuthState, StateTokenCodec, StateTokenError, DEFAULT_STATE_MAX_AGE_SECS};
