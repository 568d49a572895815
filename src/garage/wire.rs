use serde::de::DeserializeOwned;

use crate::error::{ GarageError, Result };
use crate::garage::DriveStatus;

fn looks_like_html(body: &str) -> bool {
    let trimmed = body.trim_start();
    trimmed.starts_with("<!DOCTYPE") || trimmed.starts_with("<html")
}

/// Decodes a REST response body.
///
/// Non-2xx statuses become `GarageError::Http`. Error pages served in place
/// of JSON are rejected before parsing.
pub fn decode<T: DeserializeOwned>(status: u16, body: &str) -> Result<T> {
    if !(200..300).contains(&status) {
        return Err(GarageError::Http { status, message: reason(status).to_string() });
    }

    debug!["Response: status {}, {} bytes", status, body.len()];

    if looks_like_html(body) {
        return Err(GarageError::Parse(
            "Received HTML instead of JSON. The server may be returning an error page.".to_string()));
    }

    Ok(serde_json::from_str(body)?)
}

/// Decodes the drive endpoint. The backend answers 500 when the engine breaks
/// down; that and every transport or parse failure count as a breakdown.
pub fn decode_drive(status: u16, body: &str) -> DriveStatus {
    if status == 500 {
        return DriveStatus { success: false };
    }

    match decode::<DriveStatus>(status, body) {
        Ok(drive_status) => drive_status,
        Err(err) => {
            warn!["Drive engine error: {}", err];
            DriveStatus { success: false }
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unexpected Status",
    }
}
