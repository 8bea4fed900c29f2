//! Ownership resolution.
//!
//! A registrar may touch every record. A patient may touch a referral only when the referral
//! is one of their own, and an analysis only through the referral it belongs to.

use crate::identity::Identity;
use crate::store::RecordStore;
use crate::CoreResult;
use medhelp_types::{AnalysisId, ReferralId};
use std::sync::Arc;

#[derive(Clone)]
pub struct AccessService {
    store: Arc<dyn RecordStore>,
}

impl AccessService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Decide whether `identity` may access the referral `referral_id`.
    ///
    /// For a patient the referral must appear in that patient's own referral list. An
    /// unknown referral id is never accessible to a patient.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` if the record store cannot be read.
    pub fn can_access_referral(
        &self,
        identity: &Identity,
        referral_id: ReferralId,
    ) -> CoreResult<bool> {
        match identity {
            Identity::Registrar => Ok(true),
            Identity::Patient { patient_id } => Ok(self
                .store
                .list_referrals_for_patient(*patient_id)?
                .iter()
                .any(|r| r.id == referral_id)),
        }
    }

    /// Decide whether `identity` may access the analysis `analysis_id`.
    ///
    /// Access is transitive through the analysis's referral. A missing analysis resolves to
    /// `false` for patients.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Store` if the record store cannot be read.
    pub fn can_access_analysis(
        &self,
        identity: &Identity,
        analysis_id: AnalysisId,
    ) -> CoreResult<bool> {
        if identity.is_registrar() {
            return Ok(true);
        }

        match self.store.get_analysis(analysis_id)? {
            Some(analysis) => self.can_access_referral(identity, analysis.referral_id),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Clinic;
    use medhelp_types::PatientId;

    #[test]
    fn test_registrar_accesses_everything() {
        let clinic = Clinic::new();
        let access = AccessService::new(clinic.store.clone());

        assert!(access
            .can_access_referral(&Identity::Registrar, ReferralId::new(99))
            .unwrap());
        assert!(access
            .can_access_analysis(&Identity::Registrar, AnalysisId::new(99))
            .unwrap());
    }

    #[test]
    fn test_patient_accesses_only_own_referrals() {
        let clinic = Clinic::new();
        let smith = clinic.patient("Smith", "P-1");
        let jones = clinic.patient("Jones", "P-2");
        let (smith_referral, smith_analyses) = clinic.referral(smith, &["CBC", "ECG"]);
        let (jones_referral, jones_analyses) = clinic.referral(jones, &["MRI"]);

        let access = AccessService::new(clinic.store.clone());
        let as_smith = Identity::Patient { patient_id: smith };

        assert!(access.can_access_referral(&as_smith, smith_referral).unwrap());
        assert!(!access.can_access_referral(&as_smith, jones_referral).unwrap());

        for analysis in smith_analyses {
            assert!(access.can_access_analysis(&as_smith, analysis).unwrap());
        }
        for analysis in jones_analyses {
            assert!(!access.can_access_analysis(&as_smith, analysis).unwrap());
        }
    }

    #[test]
    fn test_missing_records_are_not_accessible_to_patients() {
        let clinic = Clinic::new();
        let access = AccessService::new(clinic.store.clone());
        let ghost = Identity::Patient {
            patient_id: PatientId::new(1),
        };

        assert!(!access.can_access_referral(&ghost, ReferralId::new(1)).unwrap());
        assert!(!access.can_access_analysis(&ghost, AnalysisId::new(1)).unwrap());
    }
}
