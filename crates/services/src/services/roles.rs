//! Role resolution shared by the page guard and the API.
//!
//! [`resolve_role`] is a pure function of the session, the role cookies, the
//! stored profile role and the requested path. It never touches the database
//! or the response; instead it describes the profile write, cookie changes and
//! navigation the caller has to carry out.

use std::collections::{HashMap, HashSet};

use db::models::profile::Role;
use serde::{Deserialize, Serialize};
use strum_macros::Display;
use ts_rs::TS;
use uuid::Uuid;

pub const TEST_ROLE_COOKIE: &str = "test_role";
pub const FORCE_MANAGER_VIEW_COOKIE: &str = "force_manager_view";
pub const ADMIN_REDIRECTED_COOKIE: &str = "admin_redirected";

/// Operator-controlled role configuration.
#[derive(Debug, Clone, Default)]
pub struct RolePolicy {
    /// The only accounts that may hold the admin role.
    pub admin_user_ids: HashSet<Uuid>,
    /// Accounts pinned to a role regardless of their profile.
    pub role_overrides: HashMap<Uuid, Role>,
    /// Whether the `test_role` cookie is honored at all.
    pub impersonation_enabled: bool,
}

impl RolePolicy {
    pub fn may_be_admin(&self, user_id: Uuid) -> bool {
        self.admin_user_ids.contains(&user_id)
    }

    /// Downgrade an admin claim the policy does not back.
    fn sanitize(&self, user_id: Uuid, role: Role) -> Role {
        if role == Role::Admin && !self.may_be_admin(user_id) {
            Role::Agent
        } else {
            role
        }
    }
}

/// What the verified session says about the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub user_id: Uuid,
    pub email: Option<String>,
    /// Raw role claim from the token metadata; may be garbage.
    pub metadata_role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleCookies {
    pub test_role: Option<String>,
    pub force_manager_view: bool,
    pub admin_redirected: bool,
}

impl RoleCookies {
    /// Build from a cookie lookup function (name -> value).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            test_role: lookup(TEST_ROLE_COOKIE).filter(|value| !value.is_empty()),
            force_manager_view: lookup(FORCE_MANAGER_VIEW_COOKIE).as_deref() == Some("true"),
            admin_redirected: lookup(ADMIN_REDIRECTED_COOKIE).is_some(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RoleContext<'a> {
    pub session: &'a SessionView,
    pub cookies: &'a RoleCookies,
    /// `profiles.role`, `None` when the user has no profile yet.
    pub stored_role: Option<Role>,
    pub path: &'a str,
}

/// Which rule decided the effective role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoleSource {
    Override,
    ManagerView,
    Path,
    TestRole,
    Profile,
    Metadata,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ProfileAction {
    None,
    Create { role: Role },
    Repair { from: Role, to: Role },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CookieUpdate {
    Set { name: String, value: String },
    Clear { name: String },
}

impl CookieUpdate {
    fn set(name: &str, value: &str) -> Self {
        CookieUpdate::Set {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn clear(name: &str) -> Self {
        CookieUpdate::Clear {
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "to", rename_all = "snake_case")]
pub enum Navigation {
    Stay,
    Redirect(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct RoleResolution {
    pub role: Role,
    pub source: RoleSource,
    pub profile_action: ProfileAction,
    pub cookies: Vec<CookieUpdate>,
    pub navigation: Navigation,
}

/// Role the user holds before any view cookie or path is considered.
struct Authority {
    role: Role,
    source: RoleSource,
    profile_action: ProfileAction,
}

fn authoritative_role(policy: &RolePolicy, ctx: &RoleContext<'_>) -> Authority {
    let user_id = ctx.session.user_id;
    let claimed = ctx
        .session
        .metadata_role
        .as_deref()
        .and_then(|raw| raw.trim().parse::<Role>().ok());

    // The stored profile outranks the token claim; the claim only seeds a
    // missing profile.
    match (ctx.stored_role, claimed) {
        (Some(stored), _) => {
            let role = policy.sanitize(user_id, stored);
            Authority {
                role,
                source: RoleSource::Profile,
                profile_action: repair(stored, role),
            }
        }
        (None, Some(claimed)) => {
            let role = policy.sanitize(user_id, claimed);
            Authority {
                role,
                source: RoleSource::Metadata,
                profile_action: ProfileAction::Create { role },
            }
        }
        (None, None) => Authority {
            role: Role::Agent,
            source: RoleSource::Default,
            profile_action: ProfileAction::Create { role: Role::Agent },
        },
    }
}

fn repair(from: Role, to: Role) -> ProfileAction {
    if from == to {
        ProfileAction::None
    } else {
        ProfileAction::Repair { from, to }
    }
}

/// Resolve the effective role for one request.
///
/// Priority: operator override, manager view cookie, path section,
/// impersonation cookie, then the stored profile (or, without one, the
/// session claim).
pub fn resolve_role(policy: &RolePolicy, ctx: &RoleContext<'_>) -> RoleResolution {
    let user_id = ctx.session.user_id;
    let cookies = ctx.cookies;
    let authority = authoritative_role(policy, ctx);
    let path_role = Role::from_path(ctx.path);

    let mut updates = Vec::new();
    if cookies.admin_redirected {
        // Superseded by idempotent navigation; drop the stale marker.
        updates.push(CookieUpdate::clear(ADMIN_REDIRECTED_COOKIE));
    }

    let (role, source) = if let Some(&forced) = policy.role_overrides.get(&user_id) {
        if forced == Role::Manager && !cookies.force_manager_view {
            updates.push(CookieUpdate::set(FORCE_MANAGER_VIEW_COOKIE, "true"));
        }
        if cookies.test_role.is_some() {
            updates.push(CookieUpdate::clear(TEST_ROLE_COOKIE));
        }
        (forced, RoleSource::Override)
    } else if cookies.force_manager_view
        && matches!(authority.role, Role::Admin | Role::Manager)
    {
        (Role::Manager, RoleSource::ManagerView)
    } else {
        if cookies.force_manager_view {
            // An agent cannot widen its view.
            updates.push(CookieUpdate::clear(FORCE_MANAGER_VIEW_COOKIE));
        }

        if path_role == Some(authority.role) {
            if cookies.test_role.is_some() {
                updates.push(CookieUpdate::clear(TEST_ROLE_COOKIE));
            }
            (authority.role, RoleSource::Path)
        } else if let Some(requested) = cookies.test_role.as_deref() {
            match impersonated_role(policy, user_id, requested) {
                Some(role) => (role, RoleSource::TestRole),
                None => {
                    updates.push(CookieUpdate::clear(TEST_ROLE_COOKIE));
                    (authority.role, authority.source)
                }
            }
        } else {
            (authority.role, authority.source)
        }
    };

    let navigation = navigate(ctx.path, path_role, role, source);

    RoleResolution {
        role,
        source,
        profile_action: authority.profile_action,
        cookies: updates,
        navigation,
    }
}

fn impersonated_role(policy: &RolePolicy, user_id: Uuid, requested: &str) -> Option<Role> {
    if !policy.impersonation_enabled {
        return None;
    }
    let role = requested.trim().parse::<Role>().ok()?;
    if role == Role::Admin && !policy.may_be_admin(user_id) {
        return None;
    }
    Some(role)
}

/// Derive the target location from state; no-op when already there.
fn navigate(path: &str, path_role: Option<Role>, role: Role, source: RoleSource) -> Navigation {
    let target = match path_role {
        Some(section) if section != role => {
            if source == RoleSource::Override {
                // Pinned accounts keep their place inside the equivalent section.
                let rest = &path[section.path_prefix().len()..];
                format!("{}{}", role.path_prefix(), rest)
            } else {
                role.dashboard_path()
            }
        }
        Some(_) => return Navigation::Stay,
        None if path == "/dashboard" || path == "/login" => role.dashboard_path(),
        None => return Navigation::Stay,
    };

    if target == path {
        Navigation::Stay
    } else {
        Navigation::Redirect(target)
    }
}
