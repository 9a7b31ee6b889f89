use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

pub mod agent_application;
pub mod attachment;
pub mod calendar_event;
pub mod carrier;
pub mod carrier_commission_rate;
pub mod profile;

/// Which rows of an owned table a caller may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Organization(Uuid),
    Owner(Uuid),
}

impl Visibility {
    /// Append a `WHERE`/`AND` clause restricting `owner_column` or `org_column`.
    pub(crate) fn push_filter<'a>(
        &self,
        builder: &mut QueryBuilder<'a, Sqlite>,
        owner_column: &str,
        org_column: &str,
        has_where: bool,
    ) {
        let keyword = if has_where { " AND " } else { " WHERE " };
        match *self {
            Visibility::All => {}
            Visibility::Organization(org) => {
                builder
                    .push(keyword)
                    .push(org_column)
                    .push(" = ")
                    .push_bind(org);
            }
            Visibility::Owner(owner) => {
                builder
                    .push(keyword)
                    .push(owner_column)
                    .push(" = ")
                    .push_bind(owner);
            }
        }
    }
}
