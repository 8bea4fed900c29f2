use clap::{ArgAction, Parser, Subcommand};
use medhelp_core::constants::DEFAULT_DATA_DIR;
use medhelp_core::{
    token_ttl_hours_from_env_value, AnalysisId, ClinicServices, CoreConfig, Identity,
    ReferralId, ReferralStatus, SigningKey,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "medhelp")]
#[command(about = "MedHelp referrals CLI, acting as a registrar on the local data directory")]
struct Cli {
    /// Directory holding records.json and uploaded files
    #[arg(long, env = "MEDHELP_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Token signing key (at least 32 bytes)
    #[arg(long, env = "MEDHELP_SIGNING_KEY", hide_env_values = true)]
    signing_key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all referrals, oldest first
    ListReferrals,
    /// Overwrite a referral's status code
    #[command(allow_negative_numbers = true)]
    SetStatus {
        /// Referral id
        id: i64,
        /// New status code
        status: i32,
    },
    /// Mark an analysis as checked or unchecked
    SetChecked {
        /// Analysis id
        id: i64,
        /// true or false
        #[arg(action = ArgAction::Set)]
        checked: bool,
    },
    /// Verify a token and print its claims
    DecodeToken {
        /// Token as issued by /registration or /authentication
        token: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let ttl_hours = token_ttl_hours_from_env_value(std::env::var("MEDHELP_TOKEN_TTL_HOURS").ok())?;
    let cfg = Arc::new(CoreConfig::new(
        cli.data_dir,
        SigningKey::new(cli.signing_key.into_bytes())?,
        ttl_hours,
    )?);
    let services = ClinicServices::open(cfg)?;

    for line in run(&services, cli.command)? {
        println!("{line}");
    }
    Ok(())
}

fn run(
    services: &ClinicServices,
    command: Commands,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let registrar = Identity::Registrar;

    let lines = match command {
        Commands::ListReferrals => {
            let referrals = services.referrals.list_referrals(&registrar)?;
            if referrals.is_empty() {
                vec!["No referrals found.".to_owned()]
            } else {
                referrals
                    .into_iter()
                    .map(|d| {
                        format!(
                            "ID: {}, Date: {}, Patient: {} {} ({}), Doctor: {} ({}), ICD: {}, Status: {}",
                            d.referral.id,
                            d.referral.date,
                            d.patient.first_name,
                            d.patient.last_name,
                            d.patient.policy_number,
                            d.doctor.name,
                            d.doctor.specialty,
                            d.referral.icd_code,
                            d.referral.status
                        )
                    })
                    .collect()
            }
        }
        Commands::SetStatus { id, status } => {
            let referral = services.referrals.set_status(
                &registrar,
                ReferralId::new(id),
                ReferralStatus::new(status),
            )?;
            vec![format!("Referral {} status set to {}", referral.id, referral.status)]
        }
        Commands::SetChecked { id, checked } => {
            let analysis = services
                .analyses
                .set_checked(&registrar, AnalysisId::new(id), checked)?;
            vec![format!(
                "Analysis {} ({}) checked: {}",
                analysis.id, analysis.name, analysis.is_checked
            )]
        }
        Commands::DecodeToken { token } => {
            let decoded = services.codec.decode(&token)?;
            let mut lines = vec![
                format!("Username: {}", decoded.username),
                format!("Role: {}", decoded.identity.role()),
            ];
            if let Some(patient_id) = decoded.identity.patient_id() {
                lines.push(format!("Patient ID: {patient_id}"));
            }
            lines.push(format!("Issued at: {}", decoded.issued_at.to_rfc3339()));
            lines.push(format!("Expires at: {}", decoded.expires_at.to_rfc3339()));
            lines
        }
    };

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use medhelp_core::{DoctorDetails, NewReferral, PatientDetails, PatientId};
    use tempfile::TempDir;

    const KEY: &str = "cli-test-signing-key-0123456789abcdef";

    fn services(dir: &TempDir) -> ClinicServices {
        let cfg = CoreConfig::new(
            dir.path().to_path_buf(),
            SigningKey::new(KEY).unwrap(),
            24,
        )
        .unwrap();
        ClinicServices::open(Arc::new(cfg)).unwrap()
    }

    fn file_referral(services: &ClinicServices) -> (ReferralId, AnalysisId) {
        let (details, analyses) = services
            .referrals
            .create_referral(
                &Identity::Registrar,
                NewReferral {
                    patient: PatientDetails {
                        first_name: "John".into(),
                        last_name: "Smith".into(),
                        birth_date: NaiveDate::from_ymd_opt(1980, 1, 2).unwrap(),
                        policy_number: "P-1".into(),
                        tel: String::new(),
                    },
                    doctor: DoctorDetails {
                        name: "Dr. House".into(),
                        specialty: "Diagnostics".into(),
                    },
                    date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                    icd_code: "R50.9".into(),
                    medical_organization: "City Clinic".into(),
                    organization_contact: String::new(),
                    justification: String::new(),
                    analyses: vec!["CBC".into()],
                },
            )
            .unwrap();
        (details.referral.id, analyses[0].id)
    }

    fn parse(args: &[&str]) -> Commands {
        let mut full = vec!["medhelp", "--signing-key", KEY, "--data-dir", "/tmp/unused"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).expect("args should parse").command
    }

    #[test]
    fn parses_subcommands() {
        assert!(matches!(
            parse(&["set-status", "3", "-1"]),
            Commands::SetStatus { id: 3, status: -1 }
        ));
        assert!(matches!(
            parse(&["set-checked", "4", "false"]),
            Commands::SetChecked { id: 4, checked: false }
        ));
        assert!(matches!(parse(&["list-referrals"]), Commands::ListReferrals));
    }

    #[test]
    fn list_set_status_and_set_checked() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let services = services(&dir);

        assert_eq!(
            run(&services, Commands::ListReferrals).unwrap(),
            vec!["No referrals found.".to_owned()]
        );

        let (referral_id, analysis_id) = file_referral(&services);

        let lines = run(
            &services,
            Commands::SetStatus {
                id: referral_id.get(),
                status: 2,
            },
        )
        .unwrap();
        assert_eq!(lines, vec![format!("Referral {referral_id} status set to 2")]);

        let lines = run(&services, Commands::ListReferrals).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Smith"));
        assert!(lines[0].ends_with("Status: 2"));

        let lines = run(
            &services,
            Commands::SetChecked {
                id: analysis_id.get(),
                checked: true,
            },
        )
        .unwrap();
        assert_eq!(lines, vec![format!("Analysis {analysis_id} (CBC) checked: true")]);
    }

    #[test]
    fn unknown_ids_are_errors() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let services = services(&dir);

        assert!(run(&services, Commands::SetStatus { id: 9, status: 1 }).is_err());
        assert!(run(&services, Commands::SetChecked { id: 9, checked: true }).is_err());
    }

    #[test]
    fn decode_token_prints_claims() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let services = services(&dir);
        let issued = services
            .codec
            .issue(
                &Identity::Patient {
                    patient_id: PatientId::new(7),
                },
                "smith",
            )
            .unwrap();

        let lines = run(&services, Commands::DecodeToken { token: issued.token }).unwrap();
        assert_eq!(lines[0], "Username: smith");
        assert_eq!(lines[1], "Role: patient");
        assert_eq!(lines[2], "Patient ID: 7");

        assert!(run(&services, Commands::DecodeToken { token: "junk".into() }).is_err());
    }
}
