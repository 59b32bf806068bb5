use diesel::pg::PgConnection;
use r2d2;
use r2d2_diesel::ConnectionManager;

use repos::error::Error as RepoError;

pub type RepoResult<T> = Result<T, RepoError>;
pub type DbPool = r2d2::Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;
