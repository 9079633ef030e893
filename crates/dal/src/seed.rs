use common::CoreResult;
use models::UnLocode;
use sqlx::PgPool;

/// Idempotently upserts the UN/LOCODE dictionary from a bundled CSV, one row
/// per `(unlocode, country, place, iata_code, lat, lon)` — SPEC_FULL.md §C.2.
/// The dictionary is read-only at runtime after this step (spec.md §3).
pub async fn seed_unlocodes_from_csv(pool: &PgPool, csv_data: &str) -> CoreResult<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(csv_data.as_bytes());

    let mut count = 0;
    for record in reader.deserialize::<UnLocode>() {
        let row: UnLocode = record.map_err(|e| anyhow::anyhow!(e))?;
        upsert_unlocode(pool, &row).await?;
        count += 1;
    }
    Ok(count)
}

async fn upsert_unlocode(pool: &PgPool, row: &UnLocode) -> CoreResult<()> {
    sqlx::query(
        "INSERT INTO unlocodes (unlocode, country, place, iata_code, lat, lon)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (unlocode) DO UPDATE SET
            country = excluded.country, place = excluded.place,
            iata_code = excluded.iata_code, lat = excluded.lat, lon = excluded.lon",
    )
    .bind(&row.unlocode)
    .bind(&row.country)
    .bind(&row.place)
    .bind(&row.iata_code)
    .bind(row.lat)
    .bind(row.lon)
    .execute(pool)
    .await?;
    Ok(())
}
