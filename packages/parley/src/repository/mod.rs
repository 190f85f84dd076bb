// Repository layer: each domain lives in its own file with `impl ChatRepository`.
//
// `gateway` adapts the repository to the hub's `PersistenceGateway` contract.

use sqlx::sqlite::SqlitePool;

mod gateway;
mod groups;
mod messages;
mod users;

#[cfg(test)]
pub(crate) mod test_helpers;

#[derive(Clone)]
pub struct ChatRepository {
    pub(crate) pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}
