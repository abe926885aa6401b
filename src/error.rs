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

#[derive(Error, Debug)]
pub enum ApplicationError {
    /// missing or unusable credentials / board settings, fatal until fixed
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("remote store rejected the credentials")]
    Auth,
    #[error("record {0} does not exist")]
    NotFound(String),
    #[error("malformed remote response: {0}")]
    MalformedResponse(String),
    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("{0}")]
    Validation(String),
    #[error("screenshot upload failed: {0}")]
    UploadFailed(String),
    /// the image was uploaded but the record could not be patched, the
    /// upload is left behind unreferenced
    #[error("screenshot uploaded but not attached: {0}")]
    AttachFailed(String),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApplicationError {
    fn from(error: reqwest::Error) -> Self {
        // everything the http client itself reports is a transport failure,
        // status-code classification happens at the gateway
        ApplicationError::RemoteUnavailable(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ApplicationError>;
