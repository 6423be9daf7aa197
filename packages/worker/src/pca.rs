pub mod math;

use nalgebra::DMatrix;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::pca::math::{PcaError, fit_pca, flatten_row_major, project_all};
use crate::repo::{self, ProjectedPoint};

/// Reason reported when a group has no ready embeddings at all.
pub const NO_READY_ROWS: &str = "NO_READY_ROWS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Ok,
    Skipped,
}

/// What one `run_once` call did, printable as JSON.
#[derive(Debug, Serialize)]
pub struct PcaRunReport {
    pub status: RunStatus,
    pub basis_id: Option<i64>,
    pub ready: usize,
    pub dim: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Recomputes the projection basis and per-photo projections for one
/// `(contest_id, model_version)` group.
pub struct PcaBasisService {
    db: DatabaseConnection,
}

impl PcaBasisService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// One full read-fit-write pass in a single transaction: fetch the READY
    /// MODEL embeddings, fit the basis, upsert it, and upsert one projection
    /// row per embedding. Any error rolls the whole batch back.
    pub async fn run_once(
        &self,
        contest_id: i64,
        model_version: &str,
        dim: usize,
        min_ready: usize,
    ) -> Result<PcaRunReport> {
        // The projection rows need at least x and y.
        if dim < 2 {
            return Err(PcaError::DimTooSmall(dim).into());
        }

        let txn = self.db.begin().await?;

        let rows = repo::fetch_ready_model_embeddings(&txn, contest_id, model_version).await?;
        let ready = rows.len();

        // Nothing to fit from: stop here even when min_ready == 0.
        if ready == 0 {
            info!(contest_id, model_version, "No ready model embeddings, skipping");
            return Ok(PcaRunReport {
                status: RunStatus::Skipped,
                basis_id: None,
                ready: 0,
                dim,
                reason: Some(NO_READY_ROWS.to_string()),
            });
        }

        if ready < min_ready {
            info!(
                contest_id,
                model_version, ready, min_ready, "Not enough ready embeddings, skipping"
            );
            return Ok(PcaRunReport {
                status: RunStatus::Skipped,
                basis_id: None,
                ready,
                dim,
                reason: Some(format!("ready={ready} < min_ready={min_ready}")),
            });
        }

        let d = rows[0].1.len();
        let ids: Vec<i64> = rows.iter().map(|(photo_id, _)| *photo_id).collect();
        let x = DMatrix::from_fn(ready, d, |i, j| rows[i].1[j]);

        let model = fit_pca(&x, dim)?;
        let basis_id = repo::upsert_basis(
            &txn,
            contest_id,
            model_version,
            dim,
            model.mean.clone(),
            flatten_row_major(&model.components),
        )
        .await?;

        let z = project_all(&x, &model);
        let points: Vec<ProjectedPoint> = ids
            .iter()
            .enumerate()
            .map(|(i, &model_photo_id)| ProjectedPoint {
                model_photo_id,
                x: z[(i, 0)],
                y: z[(i, 1)],
                z: if dim >= 3 { Some(z[(i, 2)]) } else { None },
            })
            .collect();

        repo::upsert_projections(&txn, contest_id, model_version, &points).await?;
        txn.commit().await?;

        info!(
            contest_id,
            model_version, ready, dim, basis_id, "Projection basis updated"
        );

        Ok(PcaRunReport {
            status: RunStatus::Ok,
            basis_id: Some(basis_id),
            ready,
            dim,
            reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::PhotoType;
    use sea_orm::entity::prelude::PgVector;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    use super::*;
    use crate::entity::{photo_embedding, projection_basis};
    use crate::error::WorkerError;
    use crate::repo::{METHOD_PCA, STATUS_READY};

    const MODEL_VERSION: &str = "openclip-vitb32-v1";

    fn ready_row(id: i64, photo_id: i64, embedding: Vec<f32>) -> photo_embedding::Model {
        let now = Utc::now();
        photo_embedding::Model {
            id,
            contest_id: 7,
            photo_id,
            photo_type: PhotoType::Model,
            storage_key: format!("contests/7/models/{photo_id}.jpg"),
            model_version: MODEL_VERSION.into(),
            status: STATUS_READY.into(),
            embedding: PgVector::from(embedding),
            created_at: now,
            updated_at: now,
        }
    }

    fn saved_basis(id: i64, dim: i32) -> projection_basis::Model {
        let now = Utc::now();
        projection_basis::Model {
            id,
            contest_id: 7,
            model_version: MODEL_VERSION.into(),
            method: METHOD_PCA.into(),
            dim,
            mean: vec![0.0; 4],
            components: vec![0.0; 4 * dim as usize],
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn no_ready_rows_skips_without_writing() {
        // No exec results scripted: any write would fail the mock.
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<photo_embedding::Model>::new()])
            .into_connection();

        let report = PcaBasisService::new(db)
            .run_once(7, MODEL_VERSION, 3, 0)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Skipped);
        assert_eq!(report.basis_id, None);
        assert_eq!(report.ready, 0);
        assert_eq!(report.reason.as_deref(), Some(NO_READY_ROWS));
    }

    #[tokio::test]
    async fn below_min_ready_skips_without_writing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![ready_row(1, 10, vec![1.0, 0.0, 0.0, 0.0])]])
            .into_connection();

        let report = PcaBasisService::new(db)
            .run_once(7, MODEL_VERSION, 3, 5)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Skipped);
        assert_eq!(report.ready, 1);
        assert_eq!(report.reason.as_deref(), Some("ready=1 < min_ready=5"));
    }

    #[tokio::test]
    async fn fits_and_writes_basis_and_projections() {
        let rows = vec![
            ready_row(1, 10, vec![1.0, 0.0, 0.0, 0.0]),
            ready_row(2, 11, vec![0.0, 1.0, 0.0, 0.0]),
            ready_row(3, 12, vec![0.0, 0.0, 1.0, 0.0]),
        ];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .append_query_results([vec![saved_basis(42, 3)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();

        let report = PcaBasisService::new(db)
            .run_once(7, MODEL_VERSION, 3, 0)
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::Ok);
        assert_eq!(report.basis_id, Some(42));
        assert_eq!(report.ready, 3);
        assert_eq!(report.dim, 3);
        assert_eq!(report.reason, None);
    }

    #[tokio::test]
    async fn rejects_dim_without_xy() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let err = PcaBasisService::new(db)
            .run_once(7, MODEL_VERSION, 1, 0)
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Pca(PcaError::DimTooSmall(1))));
    }

    #[test]
    fn report_serializes_in_wire_shape() {
        let report = PcaRunReport {
            status: RunStatus::Skipped,
            basis_id: None,
            ready: 0,
            dim: 3,
            reason: Some(NO_READY_ROWS.to_string()),
        };
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "SKIPPED");
        assert_eq!(json["reason"], "NO_READY_ROWS");
        assert!(json["basis_id"].is_null());
    }
}
