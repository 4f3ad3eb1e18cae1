use pubchem_model::Cid;
use pubchem_model::schema::{
    DOMAIN_COMPOUND,
    DOMAIN_SUBSTANCE,
    NAMESPACE_CID,
    NAMESPACE_NAME,
    OUTPUT_JSON,
    RECORD_TYPE_3D,
    property_list,
};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{CompoundSource, RawCompound, SubstanceMatch, UpstreamError};
use crate::transport::Transport;

pub const DEFAULT_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

const BUSY_MARKERS: [&str; 2] = ["ServerBusy", "Server Busy"];

/// PubChem PUG REST client.
#[derive(Debug, Clone)]
pub struct PugRestClient {
    client: Client,
    base_url: Url,
    proxy: Option<String>,
}

impl PugRestClient {
    /// Creates a client issuing every request through `transport`.
    ///
    /// # Errors
    /// Returns `UpstreamError::InvalidUrl` if `base_url` cannot serve as a base.
    pub fn from_transport(transport: &Transport, base_url: &str) -> Result<Self, UpstreamError> {
        let mut client = Self::new(transport.client().clone(), base_url)?;
        client.proxy = transport.effective_proxy().map(str::to_string);
        Ok(client)
    }

    /// Creates a client around an existing HTTP client.
    ///
    /// # Errors
    /// Returns `UpstreamError::InvalidUrl` if `base_url` cannot serve as a base.
    pub fn new(client: Client, base_url: &str) -> Result<Self, UpstreamError> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| UpstreamError::InvalidUrl(base_url.to_string()))?;
        Ok(Self {
            client,
            base_url,
            proxy: None,
        })
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Proxy applied to the requests this client issues.
    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| UpstreamError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GETs a JSON document, mapping HTTP 404 to `None`.
    async fn get_json(&self, url: Url) -> Result<Option<Value>, UpstreamError> {
        debug!(%url, "PUG REST request");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if is_busy(status, &body) {
            return Err(UpstreamError::Busy {
                status: status.as_u16(),
                message: fault_message(&body),
            });
        }
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                message: fault_message(&body),
            });
        }
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|err| UpstreamError::Decode(err.to_string()))
    }
}

impl CompoundSource for PugRestClient {
    async fn compound_cid_by_name(&self, name: &str) -> Result<Option<Cid>, UpstreamError> {
        let mut url = self.endpoint(&[DOMAIN_COMPOUND, NAMESPACE_NAME, name, OUTPUT_JSON])?;
        url.query_pairs_mut()
            .append_pair("record_type", RECORD_TYPE_3D)
            .append_pair("MaxRecords", "1");
        let Some(body) = self.get_json(url).await? else {
            return Ok(None);
        };
        Ok(body
            .pointer("/PC_Compounds/0/id/id/cid")
            .and_then(Value::as_u64)
            .filter(|cid| *cid != 0))
    }

    async fn substance_cids_by_name(&self, name: &str) -> Result<Vec<SubstanceMatch>, UpstreamError> {
        let url = self.endpoint(&[DOMAIN_SUBSTANCE, NAMESPACE_NAME, name, "cids", OUTPUT_JSON])?;
        let Some(body) = self.get_json(url).await? else {
            return Ok(Vec::new());
        };
        let Some(entries) = body
            .pointer("/InformationList/Information")
            .and_then(Value::as_array)
        else {
            return Ok(Vec::new());
        };
        Ok(entries
            .iter()
            .map(|entry| SubstanceMatch {
                sid: entry.get("SID").and_then(Value::as_u64),
                cids: entry
                    .get("CID")
                    .and_then(Value::as_array)
                    .map(|cids| cids.iter().filter_map(Value::as_u64).collect())
                    .unwrap_or_default(),
            })
            .collect())
    }

    async fn compound_record(&self, cid: Cid) -> Result<RawCompound, UpstreamError> {
        let cid_segment = cid.to_string();
        let property_names = property_list();
        let properties_url = self.endpoint(&[
            DOMAIN_COMPOUND,
            NAMESPACE_CID,
            cid_segment.as_str(),
            "property",
            property_names.as_str(),
            OUTPUT_JSON,
        ])?;
        let body = self
            .get_json(properties_url)
            .await?
            .ok_or_else(|| UpstreamError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                message: format!("no record for CID {cid}"),
            })?;
        let properties = body
            .pointer("/PropertyTable/Properties/0")
            .cloned()
            .unwrap_or(Value::Null);

        let synonyms_url = self.endpoint(&[
            DOMAIN_COMPOUND,
            NAMESPACE_CID,
            cid_segment.as_str(),
            "synonyms",
            OUTPUT_JSON,
        ])?;
        let synonyms = match self.get_json(synonyms_url).await {
            Ok(body) => body.as_ref().and_then(parse_synonyms),
            Err(err) => {
                warn!(cid, "synonyms unavailable: {err}");
                None
            }
        };

        Ok(RawCompound {
            cid,
            properties,
            synonyms,
        })
    }
}

fn parse_synonyms(body: &Value) -> Option<Vec<String>> {
    body.pointer("/InformationList/Information/0/Synonym")
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
}

fn is_busy(status: StatusCode, body: &str) -> bool {
    status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::TOO_MANY_REQUESTS
        || (!status.is_success() && BUSY_MARKERS.iter().any(|marker| body.contains(marker)))
}

fn fault_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/Fault/Message")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn busy_detection_covers_status_and_fault_code() {
        assert!(is_busy(StatusCode::SERVICE_UNAVAILABLE, ""));
        assert!(is_busy(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_busy(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"Fault":{"Code":"PUGREST.ServerBusy"}}"#
        ));
        assert!(!is_busy(StatusCode::BAD_REQUEST, r#"{"Fault":{"Code":"PUGREST.BadRequest"}}"#));
        assert!(!is_busy(StatusCode::OK, r#"{"Synonym":["Server Busy"]}"#));
    }

    #[test]
    fn fault_message_prefers_structured_message() {
        let body = r#"{"Fault":{"Code":"PUGREST.ServerBusy","Message":"Too many requests"}}"#;
        assert_eq!(fault_message(body), "Too many requests");
        assert_eq!(fault_message("  plain text  "), "plain text");
    }

    #[test]
    fn endpoint_encodes_names_as_single_segments() {
        let client = PugRestClient::new(Client::new(), "http://localhost:1/rest/pug/")
            .expect("valid base url");
        let url = client
            .endpoint(&[DOMAIN_COMPOUND, NAMESPACE_NAME, "acetic acid/ester", OUTPUT_JSON])
            .expect("endpoint");
        assert_eq!(
            url.as_str(),
            "http://localhost:1/rest/pug/compound/name/acetic%20acid%2Fester/JSON"
        );
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            PugRestClient::new(Client::new(), "not a url"),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }

    #[test]
    fn parses_synonym_lists() {
        let body = json!({
            "InformationList": {"Information": [{"CID": 2244, "Synonym": ["aspirin", "ASA"]}]}
        });
        assert_eq!(
            parse_synonyms(&body),
            Some(vec!["aspirin".to_string(), "ASA".to_string()])
        );
        assert_eq!(parse_synonyms(&json!({})), None);
    }
}
