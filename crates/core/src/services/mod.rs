//! Authorization-aware operations over the record store.
//!
//! Every service method takes the caller's [`Identity`](crate::Identity) and decides, before
//! touching any record, whether that caller may read or mutate it. Services contain only
//! data operations; transport concerns belong in `api-rest`.

pub mod access;
pub mod accounts;
pub mod analyses;
pub mod referrals;

pub use access::AccessService;
pub use accounts::{AccountService, Registration};
pub use analyses::{AnalysisService, Download, DownloadFile};
pub use referrals::{DoctorDetails, NewReferral, PatientDetails, ReferralDetails, ReferralService};
