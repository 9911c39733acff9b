//! Out-of-band registration of the station identity with the server.

use std::time::Duration;

use log::debug;

use crate::error::RegistrationError;
use crate::identity::UserIdentity;

/// Announces an identity to the server. Called from the registration
/// worker, never from the coordinator.
pub trait Registrar: Send + 'static {
    fn register(&mut self, identity: &UserIdentity) -> Result<(), RegistrationError>;
}

/// Registers with an HTTP form POST of `username=<identity>`.
/// Any 2xx answer counts as registered.
pub struct HttpRegistrar {
    url: String,
    client: reqwest::blocking::Client,
}

impl HttpRegistrar {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RegistrationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistrationError::Request(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

impl Registrar for HttpRegistrar {
    fn register(&mut self, identity: &UserIdentity) -> Result<(), RegistrationError> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("username", identity.as_str())])
            .send()
            .map_err(|e| RegistrationError::Request(e.to_string()))?;

        let status = response.status();
        debug!("registration answered {status}");
        if status.is_success() {
            Ok(())
        } else {
            Err(RegistrationError::Rejected(status.as_u16()))
        }
    }
}
