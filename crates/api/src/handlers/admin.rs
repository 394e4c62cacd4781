//! Superuser-only operational endpoints.

use axum::extract::{Query, State};
use axum::Json;
use triggerflow_core::error::CoreError;
use triggerflow_core::queue::QueueName;
use triggerflow_db::models::dispatch_job::{status, DispatchJob, DispatchJobListQuery};
use triggerflow_db::repositories::DispatchJobRepo;

use crate::error::{AppError, AppResult};
use crate::handlers::rules::RulesResponse;
use crate::middleware::rbac::RequireSuperuser;
use crate::response::DataResponse;
use crate::state::AppState;

const JOB_STATUSES: [&str; 4] = [
    status::PENDING,
    status::CLAIMED,
    status::DONE,
    status::FAILED,
];

/// POST /api/v1/admin/rules/materialize
///
/// Re-materialize the rule cache now and return the fresh snapshot.
pub async fn materialize_rules(
    State(state): State<AppState>,
    RequireSuperuser(admin): RequireSuperuser,
) -> AppResult<Json<DataResponse<RulesResponse>>> {
    let fresh = state
        .rules
        .refresh()
        .await
        .map_err(|e| AppError::InternalError(format!("Rule materialization failed: {e}")))?;

    tracing::info!(
        user_id = admin.user_id,
        rules = fresh.len(),
        "Rules materialized on demand"
    );
    Ok(Json(DataResponse {
        data: RulesResponse::from_snapshot(&fresh, None),
    }))
}

/// GET /api/v1/admin/dispatch-jobs
///
/// Query: `queue`, `status`, `limit` (default 50, max 100), `offset`.
pub async fn list_dispatch_jobs(
    State(state): State<AppState>,
    RequireSuperuser(_admin): RequireSuperuser,
    Query(params): Query<DispatchJobListQuery>,
) -> AppResult<Json<DataResponse<Vec<DispatchJob>>>> {
    validate_job_filter(&params)?;
    let jobs = DispatchJobRepo::list(&state.pool, &params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

fn validate_job_filter(params: &DispatchJobListQuery) -> AppResult<()> {
    if let Some(queue) = params.queue.as_deref() {
        queue.parse::<QueueName>()?;
    }
    if let Some(s) = params.status.as_deref() {
        if !JOB_STATUSES.contains(&s) {
            return Err(AppError::Core(CoreError::Validation(format!(
                "Unknown job status '{s}'"
            ))));
        }
    }
    Ok(())
}
