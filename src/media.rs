/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::config::Config;
use crate::error::{ApplicationError, Result};
use crate::record::{RecordStore, RemoteFields};
use reqwest::Client;
use sha2::{Digest, Sha256};

const UPLOAD_FOLDER: &str = "youtube-screenshots";

/// uploads captured screenshots to the media host and patches the public
/// url back onto the owning record
#[derive(Debug, Clone)]
pub struct MediaGateway {
    client: Client,
    upload_url: String,
    api_key: String,
    api_secret: String,
}

impl MediaGateway {
    pub fn new(config: &Config) -> Result<Self> {
        let cloud_name = require(config.cloudinary_cloud_name(), "CLOUDINARY_CLOUD_NAME")?;
        let api_key = require(config.cloudinary_api_key(), "CLOUDINARY_API_KEY")?;
        let api_secret = require(config.cloudinary_api_secret(), "CLOUDINARY_API_SECRET")?;

        Ok(Self {
            client: Client::new(),
            upload_url: format!("https://api.cloudinary.com/v1_1/{cloud_name}/image/upload"),
            api_key,
            api_secret,
        })
    }

    /// upload a base64 data uri, returns the public image url
    pub async fn upload(&self, data_uri: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[("folder", UPLOAD_FOLDER), ("timestamp", &timestamp)],
            &self.api_secret,
        );

        let response = self
            .client
            .post(&self.upload_url)
            .form(&[
                ("file", data_uri),
                ("folder", UPLOAD_FOLDER),
                ("timestamp", &timestamp),
                ("api_key", &self.api_key),
                ("signature", &signature),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await
            .map_err(|error| ApplicationError::UploadFailed(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ApplicationError::UploadFailed(error.to_string()))?;
        if !status.is_success() {
            return Err(ApplicationError::UploadFailed(format!("{status}: {body}")));
        }

        parse_upload_response(&body)
    }

    /// two-phase attachment: the task fields are already persisted, so a
    /// record id exists. A failure after the upload leaves the image
    /// unreferenced on the host, which is accepted.
    pub async fn attach<S: RecordStore>(
        &self,
        records: &S,
        table: &str,
        record_id: &str,
        data_uri: &str,
    ) -> Result<String> {
        let image_url = self.upload(data_uri).await?;
        info!("Uploaded screenshot for record {record_id}");

        records
            .update(table, record_id, RemoteFields::for_screenshot(&image_url))
            .await
            .map_err(|error| ApplicationError::AttachFailed(error.to_string()))?;

        Ok(image_url)
    }
}

fn require(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ApplicationError::Configuration(format!("missing {name}")))
}

fn parse_upload_response(body: &str) -> Result<String> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|error| ApplicationError::UploadFailed(error.to_string()))?;

    value["secure_url"]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| ApplicationError::UploadFailed("response missing secure_url".to_owned()))
}

/// params sorted by key, joined as `k=v` pairs with `&`, secret appended,
/// hex-encoded sha256 digest
fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort();

    let joined = sorted
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_sorts_params() {
        let forward = sign(&[("folder", "x"), ("timestamp", "1")], "secret");
        let reversed = sign(&[("timestamp", "1"), ("folder", "x")], "secret");
        assert_eq!(forward, reversed);
        assert_eq!(64, forward.len());
        // different secret, different signature
        assert_ne!(forward, sign(&[("folder", "x"), ("timestamp", "1")], "other"));
    }

    #[test]
    fn test_parse_upload_response() {
        let url =
            parse_upload_response(r#"{"secure_url": "https://res.example.com/img.png"}"#).unwrap();
        assert_eq!("https://res.example.com/img.png", url.as_str());

        assert!(matches!(
            parse_upload_response(r#"{"error": {"message": "Invalid signature"}}"#),
            Err(ApplicationError::UploadFailed(_))
        ));
        assert!(parse_upload_response("<html>").is_err());
    }

    #[test]
    fn test_missing_media_credentials() {
        let config = envy::from_iter::<_, Config>(vec![
            ("AIRTABLE_ACCESS_TOKEN".to_owned(), "pat".to_owned()),
            ("AIRTABLE_BASE_ID".to_owned(), "app".to_owned()),
        ])
        .unwrap();

        assert!(matches!(
            MediaGateway::new(&config),
            Err(ApplicationError::Configuration(_))
        ));
    }
}
