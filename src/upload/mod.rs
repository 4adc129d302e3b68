//! Multipart upload engine.
//!
//! An upload runs in three stages: open a session with the control plane,
//! push every part to its presigned target through the worker pool, then
//! report the ordered part manifest back so the control plane can assemble
//! the file. Each stage fails fast; the finalizer only runs after every part
//! succeeded.

pub mod plan;
pub mod pool;

use crate::api::CreateMediaUploadResponse;
use crate::error::UploadError;
use crate::inspect::InspectedFile;
use crate::progress::ProgressObserver;
use serde::{Deserialize, Serialize};

pub use plan::{part_count, plan_parts, PartJob};
pub use pool::{
    completion_token, system_concurrency, transfer_all, HttpTransport, PartTransport, DEFAULT_CONCURRENCY,
};

/// The calls the engine needs from the control plane.
pub trait ControlPlane {
    fn open_session(&self, file_name: &str, file_size: u64) -> anyhow::Result<CreateMediaUploadResponse>;
    fn complete(&self, media_upload_id: &str, upload_id: &str, parts: &[PartResult]) -> anyhow::Result<()>;
}

/// Control-plane context for one multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Media upload id; names the completion endpoint.
    pub session_id: String,
    pub upload_id: String,
    pub part_size: u64,
    pub part_count: usize,
    /// One presigned target per part, indexed by 0-based part index.
    pub part_targets: Vec<String>,
}

impl UploadSession {
    /// Check that the negotiated layout actually covers `file_size`.
    pub fn from_response(resp: CreateMediaUploadResponse, file_size: u64) -> Result<Self, UploadError> {
        let reject = |msg: String| UploadError::NegotiationFailed(anyhow::anyhow!(msg));

        if resp.presigned_urls.len() != resp.num_parts {
            return Err(reject(format!(
                "expected {} presigned URLs, got {}",
                resp.num_parts,
                resp.presigned_urls.len()
            )));
        }
        if resp.num_parts > 0 && resp.part_size == 0 {
            return Err(reject("part size of 0 for a non-empty upload".into()));
        }
        let expected = part_count(file_size, resp.part_size);
        if resp.num_parts != expected {
            return Err(reject(format!(
                "{} parts of {} bytes do not cover {} bytes (expected {})",
                resp.num_parts, resp.part_size, file_size, expected
            )));
        }

        Ok(UploadSession {
            session_id: resp.media_upload.id,
            upload_id: resp.upload_id,
            part_size: resp.part_size,
            part_count: resp.num_parts,
            part_targets: resp.presigned_urls,
        })
    }
}

/// A transferred part as reported to the finalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartResult {
    /// 1-based.
    pub part_number: usize,
    pub etag: String,
}

/// Register the upload with the control plane.
pub fn open_session(
    control: &dyn ControlPlane,
    file_name: &str,
    file_size: u64,
) -> Result<UploadSession, UploadError> {
    let resp = control
        .open_session(file_name, file_size)
        .map_err(UploadError::NegotiationFailed)?;
    let session = UploadSession::from_response(resp, file_size)?;
    tracing::info!(
        media_upload = %session.session_id,
        parts = session.part_count,
        part_size = session.part_size,
        "upload session opened"
    );
    Ok(session)
}

/// Report the full manifest. `parts` must already be ordered by part number.
pub fn finalize(
    control: &dyn ControlPlane,
    session: &UploadSession,
    parts: &[PartResult],
) -> Result<(), UploadError> {
    debug_assert!(parts.iter().enumerate().all(|(i, p)| p.part_number == i + 1));
    control
        .complete(&session.session_id, &session.upload_id, parts)
        .map_err(UploadError::FinalizationFailed)?;
    tracing::info!(media_upload = %session.session_id, parts = parts.len(), "upload completed");
    Ok(())
}

/// Runs the whole pipeline for one file.
pub struct Uploader<'a> {
    control: &'a dyn ControlPlane,
    transport: &'a dyn PartTransport,
    progress: &'a dyn ProgressObserver,
    concurrency: usize,
}

impl<'a> Uploader<'a> {
    pub fn new(
        control: &'a dyn ControlPlane,
        transport: &'a dyn PartTransport,
        progress: &'a dyn ProgressObserver,
    ) -> Self {
        Uploader {
            control,
            transport,
            progress,
            concurrency: system_concurrency(),
        }
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Upload `file` under `upload_name`. Returns the media upload id.
    pub fn upload(&self, file: &InspectedFile, upload_name: &str) -> Result<String, UploadError> {
        let session = open_session(self.control, upload_name, file.size)?;
        let parts = transfer_all(
            &session,
            &file.path,
            file.size,
            self.concurrency,
            self.transport,
            self.progress,
        )?;
        finalize(self.control, &session, &parts)?;
        Ok(session.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MediaUpload;
    use crate::error::TransferError;
    use crate::progress::NoProgress;
    use std::io::Write;
    use std::sync::Mutex;

    fn response(part_size: u64, num_parts: usize, urls: usize) -> CreateMediaUploadResponse {
        CreateMediaUploadResponse {
            upload_id: "upload-1".into(),
            part_size,
            num_parts,
            presigned_urls: (1..=urls).map(|i| format!("t{i}")).collect(),
            media_upload: MediaUpload { id: "media-1".into() },
        }
    }

    struct FakeControlPlane {
        response: CreateMediaUploadResponse,
        completed: Mutex<Vec<(String, String, Vec<PartResult>)>>,
    }

    impl FakeControlPlane {
        fn new(response: CreateMediaUploadResponse) -> Self {
            FakeControlPlane {
                response,
                completed: Mutex::new(Vec::new()),
            }
        }
    }

    impl ControlPlane for FakeControlPlane {
        fn open_session(&self, _file_name: &str, _file_size: u64) -> anyhow::Result<CreateMediaUploadResponse> {
            Ok(self.response.clone())
        }

        fn complete(&self, media_upload_id: &str, upload_id: &str, parts: &[PartResult]) -> anyhow::Result<()> {
            self.completed
                .lock()
                .unwrap()
                .push((media_upload_id.into(), upload_id.into(), parts.to_vec()));
            Ok(())
        }
    }

    /// Answers target `tN` with the N-th letter; fails the target named in `fail`.
    struct LetterTransport {
        fail: Option<&'static str>,
    }

    impl PartTransport for LetterTransport {
        fn put_part(&self, target: &str, _body: Vec<u8>) -> Result<String, TransferError> {
            if self.fail == Some(target) {
                return Err(TransferError::Status(500));
            }
            let n: u8 = target[1..].parse().unwrap();
            Ok(((b'a' + n - 1) as char).to_string())
        }
    }

    fn media_file(len: usize) -> (tempfile::TempDir, InspectedFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::File::create(&path).unwrap().write_all(&vec![7u8; len]).unwrap();
        let file = InspectedFile {
            path,
            size: len as u64,
            content_type: "video/mp4".into(),
        };
        (dir, file)
    }

    #[test]
    fn session_rejects_inconsistent_layouts() {
        assert!(UploadSession::from_response(response(4, 3, 3), 10).is_ok());
        for (resp, size) in [
            (response(4, 3, 2), 10),
            (response(0, 1, 1), 10),
            (response(4, 2, 2), 10),
            (response(4, 4, 4), 10),
        ] {
            assert!(matches!(
                UploadSession::from_response(resp, size),
                Err(UploadError::NegotiationFailed(_))
            ));
        }
    }

    #[test]
    fn three_parts_finalize_in_order() {
        const MB: usize = 1024 * 1024;
        let (_dir, file) = media_file(10 * MB);
        let control = FakeControlPlane::new(response((4 * MB) as u64, 3, 3));
        let transport = LetterTransport { fail: None };

        let id = Uploader::new(&control, &transport, &NoProgress)
            .concurrency(3)
            .upload(&file, "clip.mp4")
            .unwrap();

        assert_eq!(id, "media-1");
        let completed = control.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        let (media, upload, parts) = &completed[0];
        assert_eq!((media.as_str(), upload.as_str()), ("media-1", "upload-1"));
        let manifest: Vec<(usize, &str)> = parts.iter().map(|p| (p.part_number, p.etag.as_str())).collect();
        assert_eq!(manifest, vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    fn failed_part_skips_finalize() {
        let (_dir, file) = media_file(50);
        let control = FakeControlPlane::new(response(10, 5, 5));
        let transport = LetterTransport { fail: Some("t4") };

        let err = Uploader::new(&control, &transport, &NoProgress)
            .upload(&file, "clip.mp4")
            .unwrap_err();

        assert!(matches!(err, UploadError::PartTransferFailed { part_number: 4, .. }));
        assert!(control.completed.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_file_finalizes_empty_manifest() {
        let (_dir, file) = media_file(0);
        let control = FakeControlPlane::new(response(4, 0, 0));
        Uploader::new(&control, &LetterTransport { fail: None }, &NoProgress)
            .upload(&file, "clip.mp4")
            .unwrap();
        let completed = control.completed.lock().unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].2.is_empty());
    }
}
