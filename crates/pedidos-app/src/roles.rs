// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::fmt;

use crate::UserProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Admin,
    Employee,
    Customer,
    Unauthorized,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Employee => "employee",
            Self::Customer => "customer",
            Self::Unauthorized => "unauthorized",
        }
    }

    /// Unknown user types map to `Unauthorized`.
    pub fn from_user_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "employee" => Self::Employee,
            "customer" => Self::Customer,
            _ => Self::Unauthorized,
        }
    }

    pub fn can_access(self, section: Section) -> bool {
        section.allowed_roles().contains(&self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Home,
    CreateOrder,
    Orders,
    Users,
}

impl Section {
    pub const ALL: [Self; 4] = [Self::Home, Self::CreateOrder, Self::Orders, Self::Users];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Home => "Home",
            Self::CreateOrder => "Create order",
            Self::Orders => "My orders",
            Self::Users => "Users",
        }
    }

    pub const fn allowed_roles(self) -> &'static [Role] {
        match self {
            Self::Home | Self::CreateOrder | Self::Orders => {
                &[Role::Admin, Role::Employee, Role::Customer]
            }
            Self::Users => &[Role::Admin],
        }
    }
}

/// Signed-in account that cannot use the app until an administrator fills
/// in its profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncompleteProfile {
    /// The backend has no profile for the account at all.
    NotFound,
    Missing {
        email: String,
        fields: Vec<&'static str>,
    },
}

impl IncompleteProfile {
    pub fn check(profile: &UserProfile) -> Option<Self> {
        let fields = [
            ("code_erp", &profile.code_erp),
            ("full_name", &profile.full_name),
            ("user_type", &profile.user_type),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect::<Vec<_>>();
        if fields.is_empty() {
            return None;
        }
        Some(Self::Missing {
            email: profile.email.clone(),
            fields,
        })
    }
}

impl fmt::Display for IncompleteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str(
                "profile is incomplete: the backend has no profile for this account -- ask an administrator to create it",
            ),
            Self::Missing { email, fields } => write!(
                f,
                "profile for {email} is incomplete (missing {}) -- ask an administrator to fill it in",
                fields.join(", ")
            ),
        }
    }
}

impl std::error::Error for IncompleteProfile {}

/// Resolves the role of a signed-in user from its `user_type`, refusing
/// accounts that cannot place orders yet.
pub fn authorize(profile: &UserProfile) -> Result<Role> {
    if let Some(incomplete) = IncompleteProfile::check(profile) {
        return Err(incomplete.into());
    }
    if !profile.is_active {
        bail!(
            "user {} is inactive -- ask an administrator to activate the account",
            profile.email
        );
    }
    let role = Role::from_user_type(&profile.user_type);
    if role == Role::Unauthorized {
        bail!(
            "user type {:?} has no access -- expected admin, employee, or customer",
            profile.user_type
        );
    }
    Ok(role)
}
