use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::delivery::{Deliverer, DeliveryError};

use super::PrintJob;

#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    /// Printed synchronously; nothing was queued.
    Printed { device: String },
    /// Stored for the dispatcher, with the reason the immediate attempt did not happen.
    Queued { id: Uuid, reason: DeliveryError },
}

/// Try to print right away; queue the job if that is not possible.
///
/// Only a storage failure is an error: a job that cannot be printed now is
/// never lost.
pub async fn submit(
    pool: &SqlitePool,
    deliverer: &Deliverer,
    job: &PrintJob,
) -> Result<Submitted, sqlx::Error> {
    let reason = match deliverer.deliver(&job.label, job.printer_name.as_deref()).await {
        Ok(device) => {
            tracing::info!("Printed '{}' label on '{device}'", job.label.label_type);
            return Ok(Submitted::Printed { device });
        }
        Err(reason @ DeliveryError::DeviceUnavailable(_)) => {
            tracing::info!("{reason}, queueing request");
            reason
        }
        Err(reason) => {
            tracing::warn!("Immediate print failed, queueing request: {reason}");
            reason
        }
    };

    let id = db::print_queue::add(pool, &job.payload, job.printer_name.as_deref()).await?;
    tracing::info!("Print request queued: {id}");

    Ok(Submitted::Queued { id, reason })
}
