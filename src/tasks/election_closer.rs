use crate::cache::ResultsCache;
use crate::db::Database;
use crate::error::ResultsError;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Periodically close elections whose end time has passed.
pub async fn check_overdue_elections_task(database: Arc<Database>, cache: ResultsCache, every: Duration) {
    info!("Starting background task to close overdue elections...");
    let mut interval = interval(every);

    loop {
        interval.tick().await;
        let now = Utc::now();

        match close_overdue_elections(&database, &cache, now).await {
            Ok(0) => {}
            Ok(closed) => info!("Closed {} overdue election(s).", closed),
            Err(e) => error!("Failed to query for overdue elections: {}", e),
        }
    }
}

/// One pass: close every active election that ended before `now` and tell
/// the results cache. Returns how many elections were closed.
pub async fn close_overdue_elections(
    database: &Database,
    cache: &ResultsCache,
    now: DateTime<Utc>,
) -> Result<usize, ResultsError> {
    let overdue = database.get_elections_due_for_close(now).await?;
    let mut closed = 0;

    for election_id in overdue {
        match database.close_election(&election_id).await {
            Ok(true) => {
                closed += 1;
                info!("Closed election {}", election_id);
                // Results can still be computed lazily on first view.
                if let Err(e) = cache.on_election_closed(&election_id).await {
                    warn!("Could not preload results for election {}: {}", election_id, e);
                }
            }
            // Someone else closed it in the meantime
            Ok(false) => {}
            Err(e) => error!("Error closing election {}: {}", election_id, e),
        }
    }

    Ok(closed)
}
