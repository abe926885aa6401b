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
use reqwest::Client;
use std::time::Duration;

// the automation service drives a real browser, captures take a while
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
struct CaptureRequest<'a> {
    video_id: &'a str,
    timestamp: u32,
}

#[derive(Deserialize, Debug, Clone)]
struct CaptureResponse {
    screenshot: String,
}

/// client for the external browser-automation screenshot service, treated
/// as an opaque function from (video, offset) to an encoded image
#[derive(Debug, Clone)]
pub struct CaptureClient {
    client: Client,
    endpoint: String,
}

impl CaptureClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .screenshot_service_url()
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ApplicationError::Configuration("missing SCREENSHOT_SERVICE_URL".to_owned())
            })?
            .to_owned();

        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }

    /// returns the captured frame as a base64 png data uri
    pub async fn capture(&self, video_id: &str, timestamp: u32) -> Result<String> {
        info!("Capturing frame of {video_id} at {timestamp}s");

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(CAPTURE_TIMEOUT)
            .json(&CaptureRequest {
                video_id,
                timestamp,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApplicationError::RemoteUnavailable(format!(
                "capture service: {status}: {body}"
            )));
        }

        let decoded: CaptureResponse = serde_json::from_str(&body)
            .map_err(|error| ApplicationError::MalformedResponse(error.to_string()))?;
        Ok(decoded.screenshot)
    }
}

/// pulls the 11-character video id out of the common youtube url shapes
pub fn extract_video_id(url: &str) -> Option<String> {
    let trimmed = url.trim();

    let candidate = if let Some((_, tail)) = trimmed.split_once("watch?") {
        // watch?v=<id> with arbitrary surrounding query params
        tail.split(['&', '#'])
            .find_map(|pair| pair.strip_prefix("v="))?
            .to_owned()
    } else if let Some((_, tail)) = trimmed
        .split_once("youtu.be/")
        .or_else(|| trimmed.split_once("/embed/"))
        .or_else(|| trimmed.split_once("/v/"))
    {
        tail.to_owned()
    } else {
        return None;
    };

    let id: String = candidate
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if id.len() == 11 {
        Some(id)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        let id = Some("nA8KmHC2Z-g".to_owned());

        assert_eq!(
            id,
            extract_video_id("https://www.youtube.com/watch?v=nA8KmHC2Z-g")
        );
        assert_eq!(
            id,
            extract_video_id("https://www.youtube.com/watch?t=10&v=nA8KmHC2Z-g#top")
        );
        assert_eq!(id, extract_video_id("https://youtu.be/nA8KmHC2Z-g"));
        assert_eq!(
            id,
            extract_video_id("https://www.youtube.com/embed/nA8KmHC2Z-g?start=5")
        );
        assert_eq!(id, extract_video_id("https://www.youtube.com/v/nA8KmHC2Z-g"));
    }

    #[test]
    fn test_extract_video_id_rejects_garbage() {
        assert_eq!(None, extract_video_id("https://example.com/watch?v=short"));
        assert_eq!(None, extract_video_id("not a url"));
        assert_eq!(None, extract_video_id(""));
    }
}
