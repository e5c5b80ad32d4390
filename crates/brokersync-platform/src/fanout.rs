//! Chunked fan-out over the remote platform API.
//!
//! One logical request (say, "visibilities for these 500 plan GUIDs") is
//! split into bounded chunks, each dispatched as an independent remote query
//! under a shared admission gate. The caller gets either the merged records
//! of every chunk or an aggregate of every chunk failure.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{CompositeError, PlatformError, Result};

/// Split identifiers into consecutive chunks of at most `chunk_size`.
///
/// The final chunk may be smaller; input order is preserved.
pub(crate) fn split_chunks(ids: &[String], chunk_size: usize) -> Vec<Vec<String>> {
    ids.chunks(chunk_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Run `query` once per chunk of `ids`, with at most `gate`-many chunks in
/// flight at any moment.
///
/// Before each dispatch one slot of the admission gate is acquired, blocking
/// while the gate is full; if `cancel` fires first, dispatch stops and the
/// call returns [`PlatformError::Cancelled`]. Chunks that were already
/// admitted always run to their natural end — the call returns only once
/// every dispatched chunk has finished, so no work escapes the caller.
///
/// Successful chunk results are merged in completion order until the first
/// failure; from then on further successes are discarded and the final
/// result is a [`CompositeError`] carrying every chunk failure.
pub async fn query_chunked<T, Q, F>(
    cancel: &CancellationToken,
    gate: &Arc<Semaphore>,
    ids: Vec<String>,
    chunk_size: usize,
    query: Q,
) -> Result<Vec<T>>
where
    T: Send + 'static,
    Q: Fn(Vec<String>) -> F,
    F: Future<Output = Result<Vec<T>>> + Send + 'static,
{
    let chunks = split_chunks(&ids, chunk_size);
    let total = chunks.len();
    let mut tasks: JoinSet<Result<Vec<T>>> = JoinSet::new();
    let mut cancelled = cancel.is_cancelled();

    for chunk in chunks {
        if cancelled {
            break;
        }
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            permit = Arc::clone(gate).acquire_owned() => {
                match permit {
                    Ok(permit) => permit,
                    // The gate only errors when closed; treat it like
                    // cancellation rather than losing admitted work.
                    Err(_) => {
                        cancelled = true;
                        break;
                    }
                }
            }
        };
        let fut = query(chunk);
        tasks.spawn(async move {
            let result = fut.await;
            drop(permit);
            result
        });
    }

    // Join every dispatched chunk, merging successes until the first error.
    let mut records = Vec::new();
    let mut failures = CompositeError::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(batch)) => {
                if failures.is_empty() {
                    records.extend(batch);
                }
            }
            Ok(Err(error)) => failures.push(error),
            Err(error) => failures.push(PlatformError::request("chunk query task", error.to_string())),
        }
    }

    if cancelled {
        debug!(chunks = total, "Fan-out cancelled before all chunks were dispatched");
        return Err(PlatformError::Cancelled);
    }
    if !failures.is_empty() {
        warn!(failed = failures.len(), chunks = total, "Fan-out completed with failures");
        return Err(failures.into());
    }
    debug!(chunks = total, records = records.len(), "Fan-out completed");
    Ok(records)
}
