use common_auth::Role;

/// Minimum role per path prefix. The longest matching prefix wins; unmatched paths are public.
#[derive(Debug, Clone, Default)]
pub struct RoutePolicy {
    rules: Vec<(String, Role)>,
}

impl RoutePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// `/godmode`, `/admin`, `/creator` and `/account` behind their matching roles.
    pub fn standard() -> Self {
        Self::new()
            .protect("/godmode", Role::Godmode)
            .protect("/admin", Role::Admin)
            .protect("/creator", Role::Creator)
            .protect("/account", Role::User)
    }

    pub fn protect(mut self, prefix: impl Into<String>, role: Role) -> Self {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/').to_string();
        self.rules.push((prefix, role));
        self
    }

    pub fn required_role(&self, path: &str) -> Option<&Role> {
        self.rules
            .iter()
            .filter(|(prefix, _)| matches_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, role)| role)
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
