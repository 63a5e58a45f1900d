use sqlx::SqlitePool;

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Beds: one row per physical bed, created once by the registry.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS beds (
  bed_id INTEGER PRIMARY KEY,
  status TEXT NOT NULL,
  guest_id TEXT
);
"#,
    )
    .execute(pool)
    .await?;

    // Reservations keyed by the caller-visible code.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reservations (
  code TEXT PRIMARY KEY,
  bed_id INTEGER NOT NULL,
  caller_name TEXT NOT NULL,
  situation TEXT NOT NULL,
  needs TEXT NOT NULL,
  language TEXT NOT NULL,

  created_at_ms BIGINT NOT NULL,
  expires_at_ms BIGINT NOT NULL,
  terminal_at_ms BIGINT,

  status TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Chapel bookings: uniqueness on (date, time) is what makes a slot a slot.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS chapel_bookings (
  booking_id TEXT PRIMARY KEY,
  service_date TEXT NOT NULL,
  service_time TEXT NOT NULL,
  group_name TEXT NOT NULL,
  contact TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL,
  UNIQUE (service_date, service_time)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS volunteers (
  volunteer_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  phone TEXT NOT NULL,
  email TEXT,
  availability_json TEXT NOT NULL,
  interests_json TEXT NOT NULL,
  created_at_ms BIGINT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_reservations_bed ON reservations(bed_id);"#)
        .execute(pool)
        .await?;

    // Makes the expiration sweep a range scan instead of a table walk.
    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_reservations_status_expiry
           ON reservations(status, expires_at_ms);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
