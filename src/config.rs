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

use crate::error::{ApplicationError, Result};
use std::path::Path;

fn default_api_url() -> String {
    "https://api.airtable.com/v0".to_owned()
}

/// credentials and endpoints sourced from the environment. Loaded once at
/// startup and passed explicitly into the gateways, never read from deep
/// call sites.
#[derive(Deserialize, Debug, Clone, Getters)]
#[get = "pub"]
pub struct Config {
    airtable_access_token: String,
    airtable_base_id: String,
    /// fallback table when no board configuration file exists
    #[serde(default)]
    airtable_table_name: Option<String>,
    #[serde(default = "default_api_url")]
    airtable_api_url: String,
    #[serde(default)]
    cloudinary_cloud_name: Option<String>,
    #[serde(default)]
    cloudinary_api_key: Option<String>,
    #[serde(default)]
    cloudinary_api_secret: Option<String>,
    /// the external browser-automation service taking the screenshots
    #[serde(default)]
    screenshot_service_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        envy::from_env::<Self>()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))
    }
}

/// the client-persisted board settings, a single key identifying which
/// remote table backs the board
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub table_name: String,
}

impl BoardConfig {
    pub fn new(table_name: &str) -> Result<Self> {
        if table_name.trim().is_empty() {
            return Err(ApplicationError::Validation(
                "table name must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            table_name: table_name.trim().to_owned(),
        })
    }

    /// `Ok(None)` when no settings file exists yet, the caller has to route
    /// the user into the configuration flow before any board operation
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let data = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&data)
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_iter() {
        let config = envy::from_iter::<_, Config>(vec![
            (
                "AIRTABLE_ACCESS_TOKEN".to_owned(),
                "patXXX.secret".to_owned(),
            ),
            ("AIRTABLE_BASE_ID".to_owned(), "appXXX".to_owned()),
        ])
        .unwrap();

        assert_eq!("patXXX.secret", config.airtable_access_token());
        assert_eq!("https://api.airtable.com/v0", config.airtable_api_url());
        assert!(config.cloudinary_cloud_name().is_none());
    }

    #[test]
    fn test_config_missing_credentials() {
        let result = envy::from_iter::<_, Config>(Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_board_config_round_trip() {
        let path = std::env::temp_dir().join(format!("cueboard-{}.json", nanoid::nanoid!()));

        assert_eq!(None, BoardConfig::load(&path).unwrap());

        let config = BoardConfig::new("Film Cues").unwrap();
        config.save(&path).unwrap();
        assert_eq!(Some(config), BoardConfig::load(&path).unwrap());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_board_config_rejects_blank_table() {
        assert!(BoardConfig::new("   ").is_err());
    }
}
