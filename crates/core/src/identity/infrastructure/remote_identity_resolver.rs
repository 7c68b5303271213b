use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::identity::domain::identity::{Identity, IdentityId};
use crate::identity::domain::identity_error::IdentityError;
use crate::identity::domain::identity_resolver::{
    validate_name, validate_teach_weight, IdentityResolver,
};
use crate::shared::config::RemoteConfig;
use crate::shared::feature_vector::FeatureVector;

/// Base64 of the vector's little-endian `f64` bytes.
pub fn encode_code(vector: &FeatureVector) -> String {
    STANDARD.encode(vector.to_le_bytes())
}

pub fn decode_code(code: &str) -> Result<FeatureVector, IdentityError> {
    let bytes = STANDARD
        .decode(code.trim())
        .map_err(|e| IdentityError::InvalidArgument(format!("malformed face code: {e}")))?;
    Ok(FeatureVector::from_le_bytes(&bytes)?)
}

#[derive(Serialize)]
struct IdentifyPayload {
    code: String,
}

#[derive(Serialize)]
struct TeachPayload<'a> {
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<IdentityId>,
    weight: f64,
}

#[derive(Serialize)]
struct RenamePayload<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct RemoteIdentity {
    id: IdentityId,
    name: String,
    code: String,
    #[serde(default = "default_observation_weight")]
    observation_weight: f64,
}

fn default_observation_weight() -> f64 {
    1.0
}

impl TryFrom<RemoteIdentity> for Identity {
    type Error = IdentityError;

    fn try_from(remote: RemoteIdentity) -> Result<Self, Self::Error> {
        Ok(Identity {
            id: remote.id,
            name: remote.name,
            centroid: decode_code(&remote.code)?,
            observation_weight: remote.observation_weight,
        })
    }
}

fn status_error(status: StatusCode, message: String) -> IdentityError {
    match status {
        StatusCode::BAD_REQUEST => IdentityError::InvalidArgument(message),
        StatusCode::NOT_FOUND => IdentityError::NotFound(message),
        _ => IdentityError::RemoteStatus {
            status: status.as_u16(),
            message,
        },
    }
}

/// [`IdentityResolver`] backed by a facerec identity server over HTTP.
///
/// The server owns the identity store; this client only moves face codes
/// and identities across the wire.
pub struct RemoteIdentityResolver {
    client: Client,
    base: Url,
}

impl RemoteIdentityResolver {
    pub fn new(config: &RemoteConfig) -> Result<Self, IdentityError> {
        let base = Url::parse(&config.url).map_err(|e| {
            IdentityError::InvalidArgument(format!("invalid server url '{}': {e}", config.url))
        })?;
        if base.cannot_be_a_base() {
            return Err(IdentityError::InvalidArgument(format!(
                "server url '{}' cannot carry a path",
                config.url
            )));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| IdentityError::Remote {
                url: config.url.clone(),
                source: Box::new(e),
            })?;
        log::info!("Using remote identity server at {base}");
        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response, IdentityError> {
        let response = request.send().map_err(|e| IdentityError::Remote {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        let message = if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        };
        log::debug!("{url} returned {status}: {message}");
        Err(status_error(status, message))
    }

    fn receive<T: DeserializeOwned>(response: Response, url: &Url) -> Result<T, IdentityError> {
        response.json::<T>().map_err(|e| IdentityError::Remote {
            url: url.to_string(),
            source: Box::new(e),
        })
    }

    fn receive_identity(response: Response, url: &Url) -> Result<Identity, IdentityError> {
        Self::receive::<RemoteIdentity>(response, url)?.try_into()
    }
}

impl IdentityResolver for RemoteIdentityResolver {
    fn identify(&self, vector: &FeatureVector) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["facecode", "identify"]);
        let payload = IdentifyPayload {
            code: encode_code(vector),
        };
        let response = self.send(self.client.post(url.clone()).json(&payload), &url)?;
        Self::receive_identity(response, &url)
    }

    fn teach(
        &self,
        vector: &FeatureVector,
        name: Option<&str>,
        id: Option<IdentityId>,
        weight: f64,
    ) -> Result<Identity, IdentityError> {
        validate_teach_weight(weight)?;
        if let Some(name) = name {
            validate_name(name)?;
        }
        let url = self.endpoint(&["facecode", "teach"]);
        let payload = TeachPayload {
            code: encode_code(vector),
            name,
            id,
            weight,
        };
        let response = self.send(self.client.post(url.clone()).json(&payload), &url)?;
        Self::receive_identity(response, &url)
    }

    fn lookup(
        &self,
        name: Option<&str>,
        id: Option<IdentityId>,
    ) -> Result<Identity, IdentityError> {
        let key = match (id, name) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => name.to_string(),
            (None, None) => {
                return Err(IdentityError::InvalidArgument(
                    "lookup requires a name or an id".into(),
                ))
            }
        };
        let url = self.endpoint(&["faces", &key]);
        let response = self.send(self.client.get(url.clone()), &url)?;
        Self::receive_identity(response, &url)
    }

    fn list(&self) -> Result<Vec<Identity>, IdentityError> {
        let url = self.endpoint(&["faces"]);
        let response = self.send(self.client.get(url.clone()), &url)?;
        let mut identities = Self::receive::<Vec<RemoteIdentity>>(response, &url)?
            .into_iter()
            .map(Identity::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        identities.sort_by_key(|identity| identity.id);
        Ok(identities)
    }

    fn rename(&self, id: IdentityId, name: &str) -> Result<Identity, IdentityError> {
        validate_name(name)?;
        let url = self.endpoint(&["faces", &id.to_string()]);
        let request = self.client.patch(url.clone()).json(&RenamePayload { name });
        let response = self.send(request, &url)?;
        Self::receive_identity(response, &url)
    }

    fn delete(&self, id: IdentityId) -> Result<Identity, IdentityError> {
        let url = self.endpoint(&["faces", &id.to_string()]);
        let response = self.send(self.client.delete(url.clone()), &url)?;
        Self::receive_identity(response, &url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::FEATURE_DIMENSION;
    use rstest::rstest;

    fn filled(value: f64) -> FeatureVector {
        FeatureVector::new(vec![value; FEATURE_DIMENSION]).unwrap()
    }

    fn resolver(url: &str) -> RemoteIdentityResolver {
        RemoteIdentityResolver::new(&RemoteConfig {
            url: url.to_string(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_code_round_trips_through_base64() {
        let code = encode_code(&filled(0.25));
        assert_eq!(decode_code(&code).unwrap(), filled(0.25));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_code("not base64!"),
            Err(IdentityError::InvalidArgument(_))
        ));
        assert!(matches!(
            decode_code(&STANDARD.encode([0u8; 24])),
            Err(IdentityError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_parses_server_identity() {
        let json = format!(
            r#"{{"id": 7, "name": "Ada", "code": "{}", "observation_weight": 3.0}}"#,
            encode_code(&filled(0.5))
        );
        let remote: RemoteIdentity = serde_json::from_str(&json).unwrap();
        let identity = Identity::try_from(remote).unwrap();

        assert_eq!(identity.id, 7);
        assert_eq!(identity.name, "Ada");
        assert_eq!(identity.centroid, filled(0.5));
        assert_eq!(identity.observation_weight, 3.0);
    }

    #[test]
    fn test_missing_weight_defaults_to_one() {
        let json = format!(
            r#"{{"id": 1, "name": "unknown", "code": "{}"}}"#,
            encode_code(&filled(0.0))
        );
        let remote: RemoteIdentity = serde_json::from_str(&json).unwrap();
        assert_eq!(remote.observation_weight, 1.0);
    }

    #[test]
    fn test_teach_payload_omits_absent_keys() {
        let payload = TeachPayload {
            code: "abc".into(),
            name: Some("Ada"),
            id: None,
            weight: 1.0,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, serde_json::json!({"code": "abc", "name": "Ada", "weight": 1.0}));
    }

    #[rstest]
    #[case::bad_request(StatusCode::BAD_REQUEST, "invalid")]
    #[case::not_found(StatusCode::NOT_FOUND, "not_found")]
    #[case::server_error(StatusCode::INTERNAL_SERVER_ERROR, "status")]
    #[case::unavailable(StatusCode::SERVICE_UNAVAILABLE, "status")]
    fn test_status_mapping(#[case] status: StatusCode, #[case] expected: &str) {
        let kind = match status_error(status, "boom".into()) {
            IdentityError::InvalidArgument(_) => "invalid",
            IdentityError::NotFound(_) => "not_found",
            IdentityError::RemoteStatus { status: code, .. } => {
                assert_eq!(code, status.as_u16());
                "status"
            }
            other => panic!("unexpected error {other:?}"),
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_endpoints_extend_base_path() {
        let remote = resolver("http://localhost:8080/api/");
        assert_eq!(
            remote.endpoint(&["facecode", "identify"]).as_str(),
            "http://localhost:8080/api/facecode/identify"
        );
        assert_eq!(
            remote.endpoint(&["faces", "Ada Lovelace"]).as_str(),
            "http://localhost:8080/api/faces/Ada%20Lovelace"
        );
    }

    #[test]
    fn test_rejects_invalid_url() {
        let err = RemoteIdentityResolver::new(&RemoteConfig::new("not a url"));
        assert!(matches!(err, Err(IdentityError::InvalidArgument(_))));
    }

    #[test]
    fn test_unreachable_server_is_remote_error() {
        let remote = resolver("http://127.0.0.1:1");
        assert!(matches!(
            remote.identify(&filled(0.1)),
            Err(IdentityError::Remote { .. })
        ));
    }

    #[test]
    fn test_arguments_are_validated_before_sending() {
        let remote = resolver("http://127.0.0.1:1");
        assert!(matches!(
            remote.lookup(None, None),
            Err(IdentityError::InvalidArgument(_))
        ));
        assert!(matches!(
            remote.teach(&filled(0.1), Some("A"), None, -2.0),
            Err(IdentityError::InvalidArgument(_))
        ));
        assert!(matches!(
            remote.rename(1, ""),
            Err(IdentityError::InvalidArgument(_))
        ));
    }
}
