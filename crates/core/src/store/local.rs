//! File-backed record store.
//!
//! All tables are held in memory behind a `RwLock`. A mutation reloads `records.json`, is
//! applied to a copy of the tables, and the copy is written back (temp file, fsync, rename)
//! before it is published. A failed write leaves both the file and the in-memory view unchanged.

use super::{
    Account, Analysis, Doctor, NewAccount, NewDoctor, NewPatient, NewReferralRecord,
    NewStoredFile, Patient, RecordStore, Referral, ReferralStatus, StoreError, StoreResult,
    StoredFile,
};
use medhelp_types::{
    AccountId, AnalysisId, DoctorId, FileId, PatientId, ReferralId,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct Tables {
    accounts: Vec<Account>,
    patients: Vec<Patient>,
    doctors: Vec<Doctor>,
    referrals: Vec<Referral>,
    analyses: Vec<Analysis>,
    files: Vec<StoredFile>,
}

/// Ids are assigned sequentially per table starting at 1. Rows are never deleted, so the
/// last row always carries the highest id.
fn next_id<T>(rows: &[T], id_of: impl Fn(&T) -> i64) -> i64 {
    rows.last().map(|row| id_of(row) + 1).unwrap_or(1)
}

impl Tables {
    fn patient_exists(&self, id: PatientId) -> bool {
        self.patients.iter().any(|p| p.id == id)
    }

    fn sorted_referrals<'a>(&self, rows: impl Iterator<Item = &'a Referral>) -> Vec<Referral> {
        let mut out: Vec<Referral> = rows.cloned().collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        out
    }

    fn analysis_mut(&mut self, id: AnalysisId) -> StoreResult<&mut Analysis> {
        self.analyses
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::AnalysisNotFound(id))
    }
}

/// Identity of the snapshot file as last loaded or written. Every write renames a fresh
/// file into place, so on unix the inode changes even when size and mtime do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
    inode: u64,
}

#[derive(Debug, Default)]
struct Snapshot {
    tables: Tables,
    /// `None` when the file did not exist.
    stamp: Option<Stamp>,
}

#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    snapshot: RwLock<Snapshot>,
}

impl LocalStore {
    /// A store that lives only in memory. Used by tests and throwaway runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            snapshot: RwLock::new(Snapshot::default()),
        }
    }

    /// Open the store backed by the JSON snapshot at `path`.
    ///
    /// A missing file yields an empty store; the file is created on the first mutation.
    /// Other processes (the `medhelp` CLI) may write the same file: reads pick up a changed
    /// snapshot and every mutation is applied on top of a fresh load.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::FileRead` or `StoreError::Deserialization` if an existing
    /// snapshot cannot be loaded.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let snapshot = load(&path)?;

        Ok(Self {
            path: Some(path),
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> StoreResult<T> {
        if let Some(path) = &self.path {
            let current = stamp_of(path)?;
            let stale = self
                .snapshot
                .read()
                .map_err(|_| StoreError::LockPoisoned)?
                .stamp
                != current;
            if stale {
                let mut guard = self.snapshot.write().map_err(|_| StoreError::LockPoisoned)?;
                *guard = load(path)?;
            }
        }

        let guard = self.snapshot.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(f(&guard.tables))
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.snapshot.write().map_err(|_| StoreError::LockPoisoned)?;

        // Always start from the file so writes made by another process are not overwritten.
        if let Some(path) = &self.path {
            *guard = load(path)?;
        }

        let mut next = guard.tables.clone();
        let out = f(&mut next)?;

        if let Some(path) = &self.path {
            persist(path, &next)?;
            guard.stamp = stamp_of(path).ok().flatten();
        }

        guard.tables = next;
        Ok(out)
    }
}

fn stamp_of(path: &Path) -> StoreResult<Option<Stamp>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(Stamp {
            modified: meta.modified().ok(),
            len: meta.len(),
            inode: inode_of(&meta),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::FileRead(e)),
    }
}

#[cfg(unix)]
fn inode_of(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode_of(_meta: &fs::Metadata) -> u64 {
    0
}

fn load(path: &Path) -> StoreResult<Snapshot> {
    // Stamp first: a write racing with the read leaves an older stamp and forces a reload.
    let stamp = stamp_of(path)?;

    let tables = match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Deserialization)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tables::default(),
        Err(e) => return Err(StoreError::FileRead(e)),
    };

    Ok(Snapshot { tables, stamp })
}

fn persist(path: &Path, tables: &Tables) -> StoreResult<()> {
    let json = serde_json::to_vec_pretty(tables).map_err(StoreError::Serialization)?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(StoreError::FileWrite)?;

    let tmp = dir.join(format!(".records.tmp-{}", uuid::Uuid::new_v4()));
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StoreError::FileWrite(e)
    })
}

impl RecordStore for LocalStore {
    fn find_account_by_username(&self, username: &str) -> StoreResult<Option<Account>> {
        self.read(|t| t.accounts.iter().find(|a| a.username == username).cloned())
    }

    fn insert_account(&self, account: NewAccount) -> StoreResult<Account> {
        self.mutate(|t| {
            if t.accounts.iter().any(|a| a.username == account.username) {
                return Err(StoreError::UsernameTaken(account.username));
            }

            if let Some(patient_id) = account.linked_patient_id {
                if !t.patient_exists(patient_id) {
                    return Err(StoreError::DanglingReference(format!(
                        "patient {patient_id} does not exist"
                    )));
                }
                if t.accounts.iter().any(|a| a.linked_patient_id == Some(patient_id)) {
                    return Err(StoreError::PatientAlreadyBound(patient_id));
                }
            }

            let row = Account {
                id: AccountId::new(next_id(&t.accounts, |a| a.id.get())),
                username: account.username,
                password_hash: account.password_hash,
                salt: account.salt,
                role: account.role,
                linked_patient_id: account.linked_patient_id,
            };
            t.accounts.push(row.clone());
            Ok(row)
        })
    }

    fn is_patient_bound(&self, patient_id: PatientId) -> StoreResult<bool> {
        self.read(|t| {
            t.accounts
                .iter()
                .any(|a| a.linked_patient_id == Some(patient_id))
        })
    }

    fn get_patient(&self, id: PatientId) -> StoreResult<Option<Patient>> {
        self.read(|t| t.patients.iter().find(|p| p.id == id).cloned())
    }

    fn find_patient_for_registration(
        &self,
        last_name: &str,
        policy_number: &str,
    ) -> StoreResult<Option<Patient>> {
        let (last_name, policy_number) = (last_name.trim(), policy_number.trim());
        self.read(|t| {
            t.patients
                .iter()
                .find(|p| {
                    p.last_name.as_str() == last_name && p.policy_number.as_str() == policy_number
                })
                .cloned()
        })
    }

    fn upsert_patient(&self, patient: NewPatient) -> StoreResult<Patient> {
        self.mutate(|t| {
            if let Some(existing) = t
                .patients
                .iter()
                .find(|p| p.policy_number == patient.policy_number)
            {
                if existing.last_name != patient.last_name {
                    return Err(StoreError::PolicyNumberMismatch(
                        patient.policy_number.into_string(),
                    ));
                }
                return Ok(existing.clone());
            }

            let row = Patient {
                id: PatientId::new(next_id(&t.patients, |p| p.id.get())),
                first_name: patient.first_name,
                last_name: patient.last_name,
                birth_date: patient.birth_date,
                policy_number: patient.policy_number,
                tel: patient.tel,
            };
            t.patients.push(row.clone());
            Ok(row)
        })
    }

    fn get_doctor(&self, id: DoctorId) -> StoreResult<Option<Doctor>> {
        self.read(|t| t.doctors.iter().find(|d| d.id == id).cloned())
    }

    fn upsert_doctor(&self, doctor: NewDoctor) -> StoreResult<Doctor> {
        self.mutate(|t| {
            if let Some(existing) = t
                .doctors
                .iter()
                .find(|d| d.name == doctor.name && d.specialty == doctor.specialty)
            {
                return Ok(existing.clone());
            }

            let row = Doctor {
                id: DoctorId::new(next_id(&t.doctors, |d| d.id.get())),
                name: doctor.name,
                specialty: doctor.specialty,
            };
            t.doctors.push(row.clone());
            Ok(row)
        })
    }

    fn insert_referral(
        &self,
        referral: NewReferralRecord,
    ) -> StoreResult<(Referral, Vec<Analysis>)> {
        self.mutate(|t| {
            if !t.patient_exists(referral.patient_id) {
                return Err(StoreError::DanglingReference(format!(
                    "patient {} does not exist",
                    referral.patient_id
                )));
            }
            if !t.doctors.iter().any(|d| d.id == referral.doctor_id) {
                return Err(StoreError::DanglingReference(format!(
                    "doctor {} does not exist",
                    referral.doctor_id
                )));
            }

            let row = Referral {
                id: ReferralId::new(next_id(&t.referrals, |r| r.id.get())),
                patient_id: referral.patient_id,
                doctor_id: referral.doctor_id,
                date: referral.date,
                icd_code: referral.icd_code,
                medical_organization: referral.medical_organization,
                organization_contact: referral.organization_contact,
                justification: referral.justification,
                status: ReferralStatus::NEW,
            };
            t.referrals.push(row.clone());

            let mut analyses = Vec::with_capacity(referral.analyses.len());
            for name in referral.analyses {
                let analysis = Analysis {
                    id: AnalysisId::new(next_id(&t.analyses, |a| a.id.get())),
                    name,
                    referral_id: row.id,
                    is_checked: false,
                    file_id: None,
                };
                t.analyses.push(analysis.clone());
                analyses.push(analysis);
            }

            Ok((row, analyses))
        })
    }

    fn get_referral(&self, id: ReferralId) -> StoreResult<Option<Referral>> {
        self.read(|t| t.referrals.iter().find(|r| r.id == id).cloned())
    }

    fn list_referrals(&self) -> StoreResult<Vec<Referral>> {
        self.read(|t| t.sorted_referrals(t.referrals.iter()))
    }

    fn list_referrals_for_patient(&self, patient_id: PatientId) -> StoreResult<Vec<Referral>> {
        self.read(|t| {
            t.sorted_referrals(t.referrals.iter().filter(|r| r.patient_id == patient_id))
        })
    }

    fn set_referral_status(&self, id: ReferralId, status: ReferralStatus) -> StoreResult<Referral> {
        self.mutate(|t| {
            let referral = t
                .referrals
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(StoreError::ReferralNotFound(id))?;
            referral.status = status;
            Ok(referral.clone())
        })
    }

    fn get_analysis(&self, id: AnalysisId) -> StoreResult<Option<Analysis>> {
        self.read(|t| t.analyses.iter().find(|a| a.id == id).cloned())
    }

    fn list_analyses(&self, referral_id: ReferralId) -> StoreResult<Vec<Analysis>> {
        self.read(|t| {
            t.analyses
                .iter()
                .filter(|a| a.referral_id == referral_id)
                .cloned()
                .collect()
        })
    }

    fn set_analysis_checked(&self, id: AnalysisId, checked: bool) -> StoreResult<Analysis> {
        self.mutate(|t| {
            let analysis = t.analysis_mut(id)?;
            analysis.is_checked = checked;
            Ok(analysis.clone())
        })
    }

    fn set_analysis_file(&self, id: AnalysisId, file_id: FileId) -> StoreResult<Analysis> {
        self.mutate(|t| {
            if !t.files.iter().any(|f| f.id == file_id) {
                return Err(StoreError::DanglingReference(format!(
                    "file {file_id} does not exist"
                )));
            }
            let analysis = t.analysis_mut(id)?;
            analysis.file_id = Some(file_id);
            Ok(analysis.clone())
        })
    }

    fn insert_file(&self, file: NewStoredFile) -> StoreResult<StoredFile> {
        self.mutate(|t| {
            let row = StoredFile {
                id: FileId::new(next_id(&t.files, |f| f.id.get())),
                name: file.name,
                path: file.path,
                size_bytes: file.size_bytes,
                media_type: file.media_type,
                sha256: file.sha256,
            };
            t.files.push(row.clone());
            Ok(row)
        })
    }

    fn get_file(&self, id: FileId) -> StoreResult<Option<StoredFile>> {
        self.read(|t| t.files.iter().find(|f| f.id == id).cloned())
    }
}
