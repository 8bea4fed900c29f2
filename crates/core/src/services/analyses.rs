//! Analysis lifecycle.
//!
//! An analysis carries a checked flag, set only by registrars, and an optional result file
//! that any caller with access to the analysis may attach or download.

use crate::identity::Identity;
use crate::services::access::AccessService;
use crate::services::referrals::require_registrar;
use crate::store::{Analysis, NewStoredFile, RecordStore, StoredFile};
use crate::{CoreError, CoreResult};
use medhelp_files::FilesService;
use medhelp_types::AnalysisId;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A stored result file ready to be streamed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadFile {
    pub path: PathBuf,
    pub download_name: String,
    pub media_type: Option<String>,
    pub size_bytes: u64,
}

/// Outcome of a download request for an existing analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Download {
    File(DownloadFile),
    /// The analysis has no attached file yet.
    NoContent,
    /// The caller may not see this analysis.
    Unauthorized,
}

#[derive(Clone)]
pub struct AnalysisService {
    store: Arc<dyn RecordStore>,
    files: Arc<FilesService>,
    access: AccessService,
}

impl AnalysisService {
    pub fn new(store: Arc<dyn RecordStore>, files: Arc<FilesService>) -> Self {
        let access = AccessService::new(store.clone());
        Self {
            store,
            files,
            access,
        }
    }

    /// Set or clear the checked flag. The attached file is left as it is.
    ///
    /// # Errors
    ///
    /// - `CoreError::AnalysisNotFound` for an unknown id, whatever the caller.
    /// - `CoreError::RegistrarOnly` for patients.
    pub fn set_checked(
        &self,
        identity: &Identity,
        analysis_id: AnalysisId,
        checked: bool,
    ) -> CoreResult<Analysis> {
        self.existing(analysis_id)?;
        require_registrar(identity)?;

        let analysis = self.store.set_analysis_checked(analysis_id, checked)?;
        tracing::info!(analysis_id = %analysis_id, checked, "analysis check state changed");
        Ok(analysis)
    }

    /// Attach a result file to an analysis.
    ///
    /// The bytes are written and synced to the file store first, then the file record is
    /// inserted, then the analysis is pointed at it. A failure between steps can leave an
    /// unreferenced file behind but never a reference to missing bytes. Any previously
    /// attached file stays in storage; only the association changes.
    ///
    /// # Arguments
    ///
    /// * `identity` - Caller; a registrar, or a patient owning the analysis
    /// * `analysis_id` - Target analysis
    /// * `file_name` - Client-supplied file name, used for the stored extension
    /// * `bytes` - File content; must not be empty
    ///
    /// # Errors
    ///
    /// Returns `CoreError` if:
    /// - the analysis does not exist ([`CoreError::AnalysisNotFound`])
    /// - a patient does not own it ([`CoreError::AnalysisForbidden`])
    /// - the content is empty ([`CoreError::InvalidInput`])
    /// - the file store or record store fails
    pub fn attach_file(
        &self,
        identity: &Identity,
        analysis_id: AnalysisId,
        file_name: &str,
        bytes: &[u8],
    ) -> CoreResult<(Analysis, StoredFile)> {
        self.existing(analysis_id)?;

        if !self.access.can_access_analysis(identity, analysis_id)? {
            tracing::warn!(%identity, analysis_id = %analysis_id, "analysis upload denied");
            return Err(CoreError::AnalysisForbidden(analysis_id));
        }

        if bytes.is_empty() {
            return Err(CoreError::InvalidInput("uploaded file is empty".into()));
        }

        let metadata = self.files.save(file_name, bytes)?;

        let stored = self.store.insert_file(NewStoredFile {
            name: metadata.original_filename.into_string(),
            path: metadata.relative_path,
            size_bytes: metadata.size_bytes,
            media_type: metadata.media_type.map(|m| m.into_string()),
            sha256: metadata.hash,
        })?;

        let analysis = self.store.set_analysis_file(analysis_id, stored.id)?;

        tracing::info!(
            analysis_id = %analysis_id,
            file_id = %stored.id,
            size_bytes = stored.size_bytes,
            "analysis file attached"
        );

        Ok((analysis, stored))
    }

    /// Resolve the file attached to an analysis for download.
    ///
    /// The download name is the analysis name followed by the stored file's extension.
    ///
    /// # Errors
    ///
    /// - `CoreError::AnalysisNotFound` for an unknown id, whatever the caller.
    /// - `CoreError::Files` if the stored path no longer resolves inside the file store.
    pub fn resolve_download(
        &self,
        identity: &Identity,
        analysis_id: AnalysisId,
    ) -> CoreResult<Download> {
        let analysis = self.existing(analysis_id)?;

        if !self.access.can_access_analysis(identity, analysis_id)? {
            tracing::warn!(%identity, analysis_id = %analysis_id, "analysis download denied");
            return Ok(Download::Unauthorized);
        }

        let Some(file_id) = analysis.file_id else {
            return Ok(Download::NoContent);
        };

        let stored = self.store.get_file(file_id)?.ok_or_else(|| {
            CoreError::Store(crate::store::StoreError::DanglingReference(format!(
                "analysis {analysis_id} references missing file {file_id}"
            )))
        })?;

        let path = self.files.resolve(stored.path.as_str())?;
        let download_name = match Path::new(stored.path.as_str())
            .extension()
            .and_then(|e| e.to_str())
        {
            Some(ext) => format!("{}.{}", analysis.name, ext),
            None => analysis.name.to_string(),
        };

        Ok(Download::File(DownloadFile {
            path,
            download_name,
            media_type: stored.media_type,
            size_bytes: stored.size_bytes,
        }))
    }

    fn existing(&self, analysis_id: AnalysisId) -> CoreResult<Analysis> {
        self.store
            .get_analysis(analysis_id)?
            .ok_or(CoreError::AnalysisNotFound(analysis_id))
    }
}
