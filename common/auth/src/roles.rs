use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ROLE_GODMODE: &str = "godmode";
pub const ROLE_SUPER_ADMIN: &str = "superadmin";
pub const ROLE_CREATOR_SOVEREIGN: &str = "creator_sovereign";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_CREATOR: &str = "creator";
pub const ROLE_USER: &str = "user";
pub const ROLE_GUEST: &str = "guest";

/// Permission level carried by a credential. Higher rank is a superset of lower rank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Guest,
    User,
    Creator,
    Admin,
    CreatorSovereign,
    SuperAdmin,
    Godmode,
    /// Anything not recognised. Never satisfies and is never satisfied.
    Unknown(String),
}

impl Role {
    /// Known roles from highest to lowest rank.
    pub fn hierarchy() -> [Role; 7] {
        [
            Role::Godmode,
            Role::SuperAdmin,
            Role::CreatorSovereign,
            Role::Admin,
            Role::Creator,
            Role::User,
            Role::Guest,
        ]
    }

    pub fn parse(value: &str) -> Self {
        let normalised = value.trim().to_ascii_lowercase().replace('-', "_");
        match normalised.as_str() {
            ROLE_GODMODE => Role::Godmode,
            ROLE_SUPER_ADMIN | "super_admin" => Role::SuperAdmin,
            ROLE_CREATOR_SOVEREIGN => Role::CreatorSovereign,
            ROLE_ADMIN => Role::Admin,
            ROLE_CREATOR => Role::Creator,
            ROLE_USER => Role::User,
            ROLE_GUEST => Role::Guest,
            _ => Role::Unknown(value.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Godmode => ROLE_GODMODE,
            Role::SuperAdmin => ROLE_SUPER_ADMIN,
            Role::CreatorSovereign => ROLE_CREATOR_SOVEREIGN,
            Role::Admin => ROLE_ADMIN,
            Role::Creator => ROLE_CREATOR,
            Role::User => ROLE_USER,
            Role::Guest => ROLE_GUEST,
            Role::Unknown(raw) => raw,
        }
    }

    /// Only the relative order is meaningful. `None` for unknown roles.
    pub fn rank(&self) -> Option<u8> {
        match self {
            Role::Guest => Some(0),
            Role::User => Some(10),
            Role::Creator => Some(20),
            Role::Admin => Some(30),
            Role::CreatorSovereign => Some(40),
            Role::SuperAdmin => Some(50),
            Role::Godmode => Some(100),
            Role::Unknown(_) => None,
        }
    }

    /// True when `self` is at least as privileged as `required`. Fails closed on unknown roles.
    pub fn satisfies(&self, required: &Role) -> bool {
        match (self.rank(), required.rank()) {
            (Some(actual), Some(needed)) => actual >= needed,
            _ => false,
        }
    }

    pub fn is_known(&self) -> bool {
        self.rank().is_some()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Role::parse(s))
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use proptest::sample::select;

    fn known_role() -> impl Strategy<Value = Role> {
        select(Role::hierarchy().to_vec())
    }

    proptest! {
        #[test]
        fn satisfies_matches_rank_order(a in known_role(), b in known_role()) {
            prop_assert_eq!(a.satisfies(&b), a.rank() >= b.rank());
        }

        #[test]
        fn hierarchy_is_antisymmetric(a in known_role(), b in known_role()) {
            if a.satisfies(&b) && b.satisfies(&a) {
                prop_assert_eq!(a, b);
            }
        }

        #[test]
        fn hierarchy_is_transitive(a in known_role(), b in known_role(), c in known_role()) {
            if a.satisfies(&b) && b.satisfies(&c) {
                prop_assert!(a.satisfies(&c));
            }
        }

        #[test]
        fn unknown_roles_fail_closed(raw in "[a-z]{3,12}", known in known_role()) {
            let unknown = Role::parse(&raw);
            prop_assume!(!unknown.is_known());
            prop_assert!(!unknown.satisfies(&known));
            prop_assert!(!known.satisfies(&unknown));
        }
    }

    #[test]
    fn hierarchy_is_strictly_descending() {
        let ranks: Vec<u8> = Role::hierarchy().iter().filter_map(Role::rank).collect();
        assert!(ranks.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn parse_accepts_common_spellings() {
        assert_eq!(Role::parse("SuperAdmin"), Role::SuperAdmin);
        assert_eq!(Role::parse("super_admin"), Role::SuperAdmin);
        assert_eq!(Role::parse("creator-sovereign"), Role::CreatorSovereign);
        assert_eq!(Role::parse(" Admin "), Role::Admin);
        assert_eq!(Role::parse("root"), Role::Unknown("root".into()));
    }

    #[test]
    fn serde_uses_plain_strings() {
        let json = serde_json::to_string(&Role::CreatorSovereign).unwrap();
        assert_eq!(json, "\"creator_sovereign\"");
        let role: Role = serde_json::from_str("\"godmode\"").unwrap();
        assert_eq!(role, Role::Godmode);
    }
}
