use common::EmbeddingJob;
use common::envelope::unwrap_body;
use sea_orm::TransactionTrait;
use tracing::info;

use crate::context::AppContext;
use crate::error::{Outcome, Result};
use crate::repo;

/// Process one raw message body: unwrap the envelope, decode, process.
pub async fn process_body(ctx: &AppContext, body: &str) -> Result<Outcome> {
    let payload = unwrap_body(body);
    let job = EmbeddingJob::from_payload(&payload)?;
    process_job(ctx, &job).await
}

/// Run one embedding job end to end.
///
/// Fetches the photo bytes, encodes them, and upserts the embedding row in
/// one transaction. Returns `Outcome::Skipped` when the subject photo row no
/// longer exists (nothing to attach an embedding to); any error propagates
/// and leaves the message eligible for redelivery.
pub async fn process_job(ctx: &AppContext, job: &EmbeddingJob) -> Result<Outcome> {
    let bytes = ctx.store.get_bytes(&job.storage_key).await?;
    let embedding = ctx.embedder.encode(&bytes).await?;

    let txn = ctx.db.begin().await?;

    if !repo::photo_exists(&txn, job.photo_type, job.photo_id).await? {
        // Rolls back on drop.
        info!(
            contest_id = job.contest_id,
            photo_id = job.photo_id,
            photo_type = %job.photo_type,
            "Photo row no longer exists, skipping"
        );
        return Ok(Outcome::Skipped);
    }

    repo::upsert_embedding(&txn, job, embedding).await?;
    txn.commit().await?;

    info!(
        contest_id = job.contest_id,
        photo_id = job.photo_id,
        photo_type = %job.photo_type,
        model_version = %job.model_version,
        "Embedding stored"
    );

    Ok(Outcome::Upserted)
}
