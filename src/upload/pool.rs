// Part transfer worker pool.
//
// A fixed number of threads pull part indices from a shared queue, read their
// byte range through a private file handle and PUT it to the part's target.
// Results land in a pre-sized, index-addressed container, so the manifest
// comes out ordered by part number no matter which worker finished first.

use super::plan::{part_job, PartJob};
use super::{PartResult, UploadSession};
use crate::error::{TransferError, UploadError};
use crate::progress::ProgressObserver;
use crossbeam_channel::{bounded, unbounded};
use reqwest::blocking::Client;
use reqwest::header::ETAG;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Worker count used when the host reports a single execution unit.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Moves the bytes of one part to its pre-authorized target and returns the
/// completion token.
pub trait PartTransport: Sync {
    fn put_part(&self, target: &str, body: Vec<u8>) -> Result<String, TransferError>;
}

/// Direct `PUT` to a presigned URL.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        HttpTransport { client }
    }

    /// Transport whose requests never time out. A large part over a slow
    /// uplink can take far longer than reqwest's default 30s budget.
    pub fn without_timeout() -> Result<Self, TransferError> {
        let client = Client::builder().timeout(None).build()?;
        Ok(HttpTransport { client })
    }
}

impl PartTransport for HttpTransport {
    fn put_part(&self, target: &str, body: Vec<u8>) -> Result<String, TransferError> {
        let res = self.client.put(target).body(body).send()?;
        let status = res.status();
        if !status.is_success() {
            return Err(TransferError::Status(status.as_u16()));
        }
        let etag = res
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .and_then(completion_token)
            .ok_or(TransferError::MissingEtag)?;
        Ok(etag.to_string())
    }
}

/// Opaque tag out of an `ETag` header value: weak prefix and quotes removed.
pub fn completion_token(header: &str) -> Option<&str> {
    let tag = header.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    let tag = tag.trim_matches('"');
    (!tag.is_empty()).then_some(tag)
}

/// Number of parallel execution units, or `DEFAULT_CONCURRENCY` when the host
/// only has one (or cannot tell).
pub fn system_concurrency() -> usize {
    match std::thread::available_parallelism() {
        Ok(n) if n.get() > 1 => n.get(),
        _ => DEFAULT_CONCURRENCY,
    }
}

#[derive(Debug)]
struct PartFailure {
    index: usize,
    error: TransferError,
}

/// Transfer every part of `session` with at most `concurrency` transfers in
/// flight. Returns the manifest ordered by part number, or the failure of the
/// lowest-numbered part if any part failed.
pub fn transfer_all(
    session: &UploadSession,
    file_path: &Path,
    file_size: u64,
    concurrency: usize,
    transport: &dyn PartTransport,
    progress: &dyn ProgressObserver,
) -> Result<Vec<PartResult>, UploadError> {
    let total = session.part_count;
    let workers = concurrency.max(1).min(total);
    progress.started(total);

    // Parts without a target are never dispatched and surface as missing.
    let dispatchable = total.min(session.part_targets.len());
    let (job_tx, job_rx) = bounded::<usize>(dispatchable);
    for index in 0..dispatchable {
        // Capacity equals the job count, so this never blocks.
        let _ = job_tx.send(index);
    }
    drop(job_tx);

    // One slot per part; only the worker that dequeued an index writes it.
    let slots: Vec<OnceLock<PartResult>> = (0..total).map(|_| OnceLock::new()).collect();
    let (err_tx, err_rx) = unbounded::<PartFailure>();
    let failed = AtomicBool::new(false);

    tracing::debug!(parts = total, workers, part_size = session.part_size, "starting part transfers");

    std::thread::scope(|s| {
        for worker in 0..workers {
            let job_rx = job_rx.clone();
            let err_tx = err_tx.clone();
            let slots = &slots;
            let failed = &failed;
            s.spawn(move || {
                while let Ok(index) = job_rx.recv() {
                    if failed.load(Ordering::SeqCst) {
                        break;
                    }
                    let job = part_job(index, session.part_size, file_size);
                    match transfer_part(&job, &session.part_targets[index], file_path, transport) {
                        Ok(etag) => {
                            let _ = slots[index].set(PartResult {
                                part_number: job.part_number(),
                                etag,
                            });
                            progress.part_completed(job.part_number());
                        }
                        Err(error) => {
                            tracing::warn!(worker, part = job.part_number(), %error, "part transfer failed");
                            failed.store(true, Ordering::SeqCst);
                            let _ = err_tx.send(PartFailure { index, error });
                            return;
                        }
                    }
                }
            });
        }
    });
    drop(err_tx);
    progress.finished();

    let mut failures: Vec<PartFailure> = err_rx.try_iter().collect();
    if !failures.is_empty() {
        let count = failures.len();
        failures.sort_by_key(|f| f.index);
        let first = failures.swap_remove(0);
        return Err(UploadError::PartTransferFailed {
            part_number: first.index + 1,
            failed: count,
            source: first.error,
        });
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.into_inner().ok_or(UploadError::MissingPart { part_number: i + 1 }))
        .collect()
}

fn transfer_part(
    job: &PartJob,
    target: &str,
    file_path: &Path,
    transport: &dyn PartTransport,
) -> Result<String, TransferError> {
    let mut file = File::open(file_path)?;
    file.seek(SeekFrom::Start(job.offset))?;
    let mut buf = vec![0u8; job.len as usize];
    file.read_exact(&mut buf)?;
    drop(file);

    tracing::debug!(part = job.part_number(), offset = job.offset, len = job.len, "uploading part");
    transport.put_part(target, buf)
}
