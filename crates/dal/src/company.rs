use common::{CoreResult, Id, SourceEndpoint, Transport};
use models::{Company, CompanyStatus};
use sqlx::PgPool;

pub struct CompanyStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CompanyStore<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, company: &Company) -> CoreResult<()> {
        let (transport, address, auth) = match &company.endpoint {
            Some(e) => (Some(e.transport.to_string()), Some(e.address.clone()), e.auth.clone()),
            None => (None, None, None),
        };
        sqlx::query(
            "INSERT INTO companies (id, company_type, status, name, company_code, email_verified, transport, address, auth)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(company.id)
        .bind(company.company_type.0.to_string())
        .bind(company.status.to_string())
        .bind(&company.name)
        .bind(&company.company_code)
        .bind(company.email_verified)
        .bind(transport)
        .bind(address)
        .bind(auth)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: Id) -> CoreResult<Option<Company>> {
        let row = sqlx::query_as::<_, CompanyRow>(
            "SELECT id, company_type, status, name, company_code, email_verified, transport, address, auth
             FROM companies WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn set_status(&self, id: Id, status: CompanyStatus) -> CoreResult<()> {
        sqlx::query("UPDATE companies SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.to_string())
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Intermediate row shape: `sqlx::FromRow` can't derive the `CompanyType`
/// bridging done in `models::Company`, so the store maps it by hand.
#[derive(sqlx::FromRow)]
struct CompanyRow {
    id: Id,
    company_type: String,
    status: CompanyStatus,
    name: String,
    company_code: String,
    email_verified: bool,
    transport: Option<String>,
    address: Option<String>,
    auth: Option<String>,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        use std::str::FromStr;
        let company_type = common::CompanyType::from_str(&row.company_type)
            .unwrap_or(common::CompanyType::Agent)
            .into();
        let endpoint = row.transport.and_then(|t| {
            Some(SourceEndpoint {
                transport: match t.as_str() {
                    "grpc" => Transport::Grpc,
                    "http" => Transport::Http,
                    _ => Transport::Mock,
                },
                address: row.address?,
                auth: row.auth,
            })
        });
        Company {
            id: row.id,
            company_type,
            status: row.status,
            name: row.name,
            company_code: row.company_code,
            email_verified: row.email_verified,
            endpoint,
        }
    }
}
