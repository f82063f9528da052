use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// Server selection gives up after this long; the storage supervisor retries.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Build a client for `database_name` and check that it answers a ping.
///
/// A single attempt is made. Backoff between attempts belongs to the caller.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let mut options = options.clone();
    options
        .server_selection_timeout
        .get_or_insert(SERVER_SELECTION_TIMEOUT);

    let client =
        Client::with_options(options).map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|source| MongoDaoError::InitialPing {
            database: database_name.to_owned(),
            source,
        })?;
    debug!(database = database_name, "MongoDB answered the initial ping");

    Ok((client, database))
}
