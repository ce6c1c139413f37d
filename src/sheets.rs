use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SHEETS_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// A single upload cell. Numbers must be finite to be representable in the
/// API's JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl CellValue {
    fn to_json(&self) -> Option<Value> {
        match self {
            CellValue::Text(s) => Some(Value::String(s.clone())),
            CellValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number),
            CellValue::Bool(b) => Some(Value::Bool(*b)),
            CellValue::Empty => Some(Value::String(String::new())),
        }
    }
}

/// The tabular data to upload: one header row followed by data rows.
#[derive(Debug, Clone)]
pub struct UploadTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl UploadTable {
    /// Header row plus data rows as the API's row-major values array. A
    /// non-finite number surfaces as [`Error::NonSerializable`] naming the
    /// offending cell.
    fn to_values(&self) -> Result<Vec<Vec<Value>>, Error> {
        let mut values = Vec::with_capacity(self.rows.len() + 1);
        values.push(
            self.columns
                .iter()
                .map(|c| Value::String(c.clone()))
                .collect::<Vec<_>>(),
        );
        for (row, cells) in self.rows.iter().enumerate() {
            let mut out = Vec::with_capacity(cells.len());
            for (col, cell) in cells.iter().enumerate() {
                out.push(
                    cell.to_json()
                        .ok_or(Error::NonSerializable { row, col })?,
                );
            }
            values.push(out);
        }
        Ok(values)
    }
}

/// The fields of a Google service-account JSON key file this module needs.
#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

/// JWT claims for the OAuth2 service-account flow.
#[derive(Serialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Upload a table to a Google Sheet worksheet, replacing its contents.
///
/// Authenticates with the service-account key file (RS256 JWT exchanged for
/// a bearer token), clears the worksheet's values, then writes the header
/// row and data rows with `USER_ENTERED` input interpretation.
///
/// Failures are remapped to descriptive kinds: an unknown or inaccessible
/// spreadsheet id is [`Error::SpreadsheetNotFound`], an unknown tab is
/// [`Error::WorksheetNotFound`], a non-JSON-representable cell is
/// [`Error::NonSerializable`] (checked before any network I/O), and any
/// other API failure is [`Error::Api`].
pub fn gsheet_upload(
    credentials: &Path,
    spreadsheet_id: &str,
    worksheet_name: &str,
    table: &UploadTable,
) -> Result<(), Error> {
    let values = table.to_values()?;

    let client = reqwest::blocking::Client::new();
    let token = access_token(&client, credentials)?;

    let worksheet = encode_worksheet(worksheet_name);
    let clear_url = format!("{SHEETS_BASE}/{spreadsheet_id}/values/{worksheet}:clear");
    let response = client
        .post(&clear_url)
        .bearer_auth(&token)
        .json(&json!({}))
        .send()
        .map_err(|e| Error::Api(e.to_string()))?;
    check_status(response, spreadsheet_id, worksheet_name)?;

    let update_url = format!(
        "{SHEETS_BASE}/{spreadsheet_id}/values/{worksheet}?valueInputOption=USER_ENTERED"
    );
    let body = json!({
        "range": worksheet_name,
        "majorDimension": "ROWS",
        "values": values,
    });
    let response = client
        .put(&update_url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .map_err(|e| Error::Api(e.to_string()))?;
    check_status(response, spreadsheet_id, worksheet_name)?;

    log::info!("dataset uploaded to Google Sheet: {spreadsheet_id}.{worksheet_name}");
    Ok(())
}

/// Worksheet names go into the URL path, so spaces, "!" and friends must be
/// percent-encoded.
fn encode_worksheet(name: &str) -> String {
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Exchange a signed service-account assertion for a bearer token.
fn access_token(client: &reqwest::blocking::Client, key_path: &Path) -> Result<String, Error> {
    let raw = std::fs::read_to_string(key_path).map_err(|e| Error::Credentials(e.to_string()))?;
    let key: ServiceAccountKey =
        serde_json::from_str(&raw).map_err(|e| Error::Credentials(e.to_string()))?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Credentials(e.to_string()))?
        .as_secs();
    let claims = Claims {
        iss: key.client_email.clone(),
        scope: SHEETS_SCOPE.to_string(),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + 3600,
    };
    let encoding_key = jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| Error::Credentials(e.to_string()))?;
    let assertion = jsonwebtoken::encode(
        &jsonwebtoken::Header::new(jsonwebtoken::Algorithm::RS256),
        &claims,
        &encoding_key,
    )
    .map_err(|e| Error::Credentials(e.to_string()))?;

    let response = client
        .post(&key.token_uri)
        .form(&[
            ("grant_type", JWT_BEARER_GRANT),
            ("assertion", assertion.as_str()),
        ])
        .send()
        .map_err(|e| Error::Api(e.to_string()))?;
    if !response.status().is_success() {
        return Err(Error::Api(format!(
            "token exchange failed: {}",
            response.status()
        )));
    }
    let token: TokenResponse = response.json().map_err(|e| Error::Api(e.to_string()))?;
    Ok(token.access_token)
}

fn check_status(
    response: reqwest::blocking::Response,
    spreadsheet_id: &str,
    worksheet_name: &str,
) -> Result<(), Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().unwrap_or_default();
    if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::SpreadsheetNotFound(spreadsheet_id.to_string()));
    }
    // The values API reports an unknown tab as a range-parse failure.
    if status == reqwest::StatusCode::BAD_REQUEST && body.contains("Unable to parse range") {
        return Err(Error::WorksheetNotFound(worksheet_name.to_string()));
    }
    Err(Error::Api(format!("{status}: {body}")))
}
