//! Bearer credentials from the external session authority.

/// Supplies the credential attached to every backend request.
pub trait Authority {
    /// The current bearer token, or `None` when not signed in.
    fn bearer_token(&self) -> Option<String>;
}

/// A token fixed at startup (CLI flag or environment).
#[derive(Clone, Debug, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token.filter(|t| !t.trim().is_empty()))
    }
}

impl Authority for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}
