//! `rezcore-cli`: a thin local smoke-driving harness, in the spirit of the
//! teacher's `src/main.rs` + `inventory-cli`. It talks to the same `dal`
//! stores and `rezcore` subsystems a real inbound transport would, against
//! the `Mock` adapter — no network listener is started here (SPEC_FULL.md
//! §A: this is a development harness, not the outward transport shell).
use std::sync::Arc;

use clap::{Parser, Subcommand};
use common::{CompanyType, Id, SourceEndpoint, Transport};
use dal::{AgreementStore, BookingStore, CompanyStore, CoverageStore, HealthStore, Stores};
use metrics::TracingSink;
use models::{AgreementStatus, Company, CompanyStatus};
use rezcore::{AgreementManager, BookingCore, CreateBookingRequest, FanOutEngine, MaintenanceTicker, OtaEnvelopeBuilder};

#[derive(Parser, Debug)]
#[command(name = "rezcore-cli", author, version, about = "Reservation middleware smoke-driving CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load the UN/LOCODE dictionary from a bundled CSV file.
    SeedUnlocodes { csv_path: String },

    /// Register a new company (AGENT or SOURCE).
    RegisterCompany {
        name: String,
        company_code: String,
        #[arg(value_enum)]
        company_type: CliCompanyType,
        /// SOURCE only: the mock transport's declared unlocode.
        #[arg(long)]
        mock_address: Option<String>,
    },

    /// Mark a company ACTIVE (simulates email verification).
    VerifyCompany { id: Id },

    /// Declare which UN/LOCODEs a source covers.
    SyncCoverage {
        source_id: Id,
        #[arg(value_delimiter = ',')]
        unlocodes: Vec<String>,
    },

    /// Create a DRAFT agreement between an agent and a source.
    CreateAgreement {
        agent_id: Id,
        source_id: Id,
        agreement_ref: String,
    },

    /// Walk an agreement DRAFT -> OFFERED -> ACCEPTED -> ACTIVE in one shot.
    ActivateAgreement { agreement_id: Id },

    /// Submit an availability search; prints the job id to poll.
    Submit {
        agent_id: Id,
        pickup_unlocode: String,
        dropoff_unlocode: String,
        pickup_iso: chrono::DateTime<chrono::Utc>,
        dropoff_iso: chrono::DateTime<chrono::Utc>,
    },

    /// Long-poll a Submit job for new results.
    Poll {
        job_id: Id,
        #[arg(long, default_value_t = 0)]
        since_seq: i64,
        #[arg(long, default_value_t = 3000)]
        wait_ms: u64,
    },

    /// Create a booking against an ACTIVE agreement.
    BookingCreate {
        agent_id: Id,
        source_id: Id,
        agreement_ref: String,
        pickup_unlocode: String,
        dropoff_unlocode: String,
        pickup_iso: chrono::DateTime<chrono::Utc>,
        dropoff_iso: chrono::DateTime<chrono::Utc>,
        vehicle_class: String,
        #[arg(long)]
        idempotency_key: String,
    },

    /// Cancel an existing booking.
    BookingCancel {
        source_id: Id,
        supplier_booking_ref: String,
    },

    /// Print the OTA-style reservation envelope for a booking.
    BookingShow { booking_id: Id },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliCompanyType {
    Agent,
    Source,
}

impl From<CliCompanyType> for CompanyType {
    fn from(t: CliCompanyType) -> Self {
        match t {
            CliCompanyType::Agent => CompanyType::Agent,
            CliCompanyType::Source => CompanyType::Source,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let pool = dal::initialize().await?;
    let settings = config::settings();
    let _maintenance = MaintenanceTicker::spawn(pool.clone(), settings.job_ttl_seconds, settings.offer_ttl_seconds);
    let stores = Stores::new(&pool);
    let registry = Arc::new(adapters::AdapterRegistry::new());
    let metrics: Arc<dyn metrics::MetricsSink> = Arc::new(TracingSink);

    match cli.command {
        Command::SeedUnlocodes { csv_path } => {
            let csv_data = std::fs::read_to_string(csv_path)?;
            let count = dal::seed_unlocodes_from_csv(&pool, &csv_data).await?;
            println!("seeded {count} unlocodes");
        }

        Command::RegisterCompany { name, company_code, company_type, mock_address } => {
            let company_type: CompanyType = company_type.into();
            let endpoint = match (company_type, mock_address) {
                (CompanyType::Source, Some(address)) => Some(SourceEndpoint {
                    transport: Transport::Mock,
                    address,
                    auth: None,
                }),
                _ => None,
            };
            let company = Company {
                id: Id::new(),
                company_type: company_type.into(),
                status: CompanyStatus::PendingVerification,
                name,
                company_code,
                email_verified: false,
                endpoint,
            };
            CompanyStore::new(&pool).insert(&company).await?;
            println!("registered company {}", company.id);
        }

        Command::VerifyCompany { id } => {
            CompanyStore::new(&pool).set_status(id, CompanyStatus::Active).await?;
            println!("company {id} is now ACTIVE");
        }

        Command::SyncCoverage { source_id, unlocodes } => {
            let summary = CoverageStore::new(&pool).sync_source_coverage(source_id, &unlocodes).await?;
            println!(
                "coverage synced: {} added, {} removed, {} unchanged",
                summary.added, summary.removed, summary.unchanged
            );
        }

        Command::CreateAgreement { agent_id, source_id, agreement_ref } => {
            let manager = AgreementManager::new(AgreementStore::new(&pool), CompanyStore::new(&pool));
            let agreement = manager.create_draft(agent_id, source_id, &agreement_ref).await?;
            println!("created agreement {} in status {}", agreement.id, agreement.status);
        }

        Command::ActivateAgreement { agreement_id } => {
            let manager = AgreementManager::new(AgreementStore::new(&pool), CompanyStore::new(&pool));
            manager.offer(agreement_id).await?;
            manager.accept(agreement_id).await?;
            let agreement = manager.set_status(agreement_id, AgreementStatus::Active).await?;
            println!("agreement {} is now {}", agreement.id, agreement.status);
        }

        Command::Submit { agent_id, pickup_unlocode, dropoff_unlocode, pickup_iso, dropoff_iso } => {
            let engine = FanOutEngine::new(pool.clone(), registry, metrics, settings.fanout, settings.health);
            let criteria = serde_json::json!({
                "pickup_unlocode": pickup_unlocode,
                "dropoff_unlocode": dropoff_unlocode,
                "pickup_iso": pickup_iso,
                "dropoff_iso": dropoff_iso,
            });
            let result = engine.submit(agent_id, criteria).await?;
            println!(
                "job {} submitted, expecting {} sources, poll again in ~{}ms",
                result.request_id, result.expected_sources, result.recommended_poll_ms
            );
        }

        Command::Poll { job_id, since_seq, wait_ms } => {
            let since = stores.availability.get_since(job_id, since_seq, wait_ms).await?;
            println!(
                "status={:?} last_seq={} responses={}/{} new_items={}",
                since.status, since.last_seq, since.responses_received, since.total_expected, since.new_items.len()
            );
            for item in &since.new_items {
                println!("  seq={} source={} {:?}", item.seq, item.source_id, item.offer);
            }
        }

        Command::BookingCreate {
            agent_id,
            source_id,
            agreement_ref,
            pickup_unlocode,
            dropoff_unlocode,
            pickup_iso,
            dropoff_iso,
            vehicle_class,
            idempotency_key,
        } => {
            let core = BookingCore::new(
                BookingStore::new(&pool),
                AgreementStore::new(&pool),
                CompanyStore::new(&pool),
                HealthStore::new(&pool),
                settings.health,
                registry,
                metrics,
            );
            let booking = core
                .create(CreateBookingRequest {
                    agent_id,
                    source_id,
                    agreement_ref,
                    supplier_offer_ref: None,
                    idempotency_key,
                    agent_booking_ref: None,
                    pickup_unlocode,
                    dropoff_unlocode,
                    pickup_iso,
                    dropoff_iso,
                    vehicle_class,
                    driver_age: 30,
                    residency_country: "US".to_string(),
                    customer_info: None,
                    payment_info: None,
                })
                .await?;
            println!("booking {} created, status {}, supplier_ref={:?}", booking.id, booking.status, booking.supplier_booking_ref);
        }

        Command::BookingCancel { source_id, supplier_booking_ref } => {
            let core = BookingCore::new(
                BookingStore::new(&pool),
                AgreementStore::new(&pool),
                CompanyStore::new(&pool),
                HealthStore::new(&pool),
                settings.health,
                registry,
                metrics,
            );
            let booking = core.cancel(source_id, &supplier_booking_ref, None).await?;
            println!("booking {} is now {}", booking.id, booking.status);
        }

        Command::BookingShow { booking_id } => {
            let booking = stores
                .bookings
                .get(booking_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("booking {booking_id} not found"))?;
            let builder = OtaEnvelopeBuilder::new(CompanyStore::new(&pool));
            let envelope = builder.reservation_envelope(&booking).await?;
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        }
    }

    Ok(())
}
