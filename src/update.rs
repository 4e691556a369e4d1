#![cfg(feature = "web")]

use serde::Serialize;

use crate::changeset::{ChangeSet, DATA_ROW_OFFSET, cell_count, compile};
use crate::error::SheetError;
use crate::permission::{Authorization, Role, authorize};
use crate::sheets::SpreadsheetService;

/// Result of an update that reached a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateOutcome {
    /// The role may not make these changes; nothing was read or written
    Denied(String),
    /// `updated` is false when no requested column exists in the sheet
    Applied { updated: bool },
}

/// Apply a change set to one tab of a spreadsheet
///
/// The permission check runs first, on the column names exactly as the
/// caller sent them. The header row is then read fresh for this call and
/// every known cell goes out in a single batch write. Service errors are
/// returned as they are and never retried.
pub async fn apply_changes(
    service: &dyn SpreadsheetService,
    sheet_id: &str,
    sheet_name: &str,
    changes: &ChangeSet,
    role: &Role,
) -> Result<UpdateOutcome, SheetError> {
    if let Authorization::Denied(reason) = authorize(role, changes) {
        log::info!(
            "Denied update of {} cell(s) on '{}' for role {}: {}",
            cell_count(changes),
            sheet_name,
            role,
            reason
        );
        return Ok(UpdateOutcome::Denied(reason));
    }

    let headers = service.get_header_row(sheet_id, sheet_name).await?;
    if headers.is_empty() {
        return Err(SheetError::NoHeader {
            sheet: sheet_name.to_string(),
        });
    }

    let writes = compile(sheet_name, &headers, changes, DATA_ROW_OFFSET);
    if writes.is_empty() {
        log::debug!("Nothing to write on '{}'", sheet_name);
        return Ok(UpdateOutcome::Applied { updated: false });
    }

    service.batch_write(sheet_id, &writes).await.map_err(|e| {
        log::error!("Batch write to '{}' failed: {}", sheet_name, e);
        e
    })?;
    log::info!("Wrote {} cell(s) to '{}'", writes.len(), sheet_name);

    Ok(UpdateOutcome::Applied { updated: true })
}
