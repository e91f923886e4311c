/// Marker trait unifying "something you can run a MySQL query against":
/// a pool, a checked-out connection, or a transaction.
///
/// Rather than a hand-rolled tagged union over `Get`/`Select`/`Exec`, query
/// functions in
/// this workspace are written generic over `E: Exec<'e>` and sqlx's own
/// blanket `Executor` impls do the rest: `&MySqlPool`,
/// `&mut PoolConnection<MySql>` and `&mut Transaction<'_, MySql>` all
/// already implement `sqlx::Executor<'e, Database = MySql>`.
pub trait Exec<'e>: sqlx::Executor<'e, Database = sqlx::MySql> {}

impl<'e, T> Exec<'e> for T where T: sqlx::Executor<'e, Database = sqlx::MySql> {}
