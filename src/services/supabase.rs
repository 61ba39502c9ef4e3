use crate::config::SupabaseSettings;
use crate::models::{RawProfileRecord, VerificationData};
use crate::services::store::{CandidateFilter, ProfileStore, StoreError, VerificationProvider};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

/// Table names exposed through the REST API.
#[derive(Debug, Clone)]
pub struct SupabaseTables {
    pub profiles: String,
    pub verification: String,
}

/// Client for the hosted PostgREST API that owns profile rows.
///
/// Serves both raw profile rows and verification flags. Rows are returned
/// untouched; normalisation happens in the core.
pub struct SupabaseClient {
    base_url: String,
    api_key: String,
    client: Client,
    tables: SupabaseTables,
}

impl SupabaseClient {
    pub fn new(base_url: String, api_key: String, tables: SupabaseTables, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url,
            api_key,
            client,
            tables,
        })
    }

    pub fn from_settings(settings: &SupabaseSettings) -> Result<Self, StoreError> {
        Self::new(
            settings.url.clone(),
            settings.api_key.clone(),
            SupabaseTables {
                profiles: settings.profiles_table.clone(),
                verification: settings.verification_table.clone(),
            },
            Duration::from_secs(settings.timeout_secs),
        )
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    async fn rows(&self, response: Response, what: &str) -> Result<Vec<Value>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            tracing::error!("Failed to fetch {}: {}", what, status);
            return Err(if status.is_server_error() {
                StoreError::Unavailable(format!("{} returned {}", what, status))
            } else {
                StoreError::InvalidResponse(format!("{} returned {}", what, status))
            });
        }

        match response.json::<Value>().await? {
            Value::Array(rows) => Ok(rows),
            _ => Err(StoreError::InvalidResponse(format!("{}: expected a JSON array", what))),
        }
    }
}

/// PostgREST `in` list with each value quoted.
fn in_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| format!("\"{}\"", id.replace('"', "\\\"")))
        .collect();
    format!("({})", quoted.join(","))
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile(&self, user_id: &str) -> Result<Option<RawProfileRecord>, StoreError> {
        let url = format!(
            "{}?user_id=eq.{}&limit=1",
            self.table_url(&self.tables.profiles),
            urlencoding::encode(user_id)
        );

        tracing::debug!("Fetching profile from: {}", url);

        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows = self.rows(response, "profile").await?;

        Ok(rows.into_iter().next().and_then(RawProfileRecord::from_value))
    }

    async fn query_candidates(&self, filter: &CandidateFilter) -> Result<Vec<RawProfileRecord>, StoreError> {
        let mut url = format!(
            "{}?user_type=eq.{}&order=user_id.asc&limit={}",
            self.table_url(&self.tables.profiles),
            urlencoding::encode(&filter.user_type),
            filter.limit
        );
        if !filter.exclude_ids.is_empty() {
            url.push_str("&user_id=not.in.");
            url.push_str(&urlencoding::encode(&in_list(&filter.exclude_ids)));
        }

        tracing::debug!(
            "Querying candidates ({} excluded, limit {})",
            filter.exclude_ids.len(),
            filter.limit
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows = self.rows(response, "candidates").await?;

        let total = rows.len();
        let records: Vec<RawProfileRecord> = rows.into_iter().filter_map(RawProfileRecord::from_value).collect();
        if records.len() < total {
            tracing::warn!("Dropped {} non-object candidate rows", total - records.len());
        }

        Ok(records)
    }
}

#[async_trait]
impl VerificationProvider for SupabaseClient {
    async fn verification(&self, user_id: &str) -> Result<VerificationData, StoreError> {
        let url = format!(
            "{}?user_id=eq.{}&select=email_verified,phone_verified,kyc_verified&limit=1",
            self.table_url(&self.tables.verification),
            urlencoding::encode(user_id)
        );

        let response = self.authorized(self.client.get(&url)).send().await?;
        let rows = self.rows(response, "verification").await?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| StoreError::InvalidResponse(format!("Failed to parse verification: {}", e))),
            None => Ok(VerificationData::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchingContext;
    use mockito::Matcher as Query;
    use serde_json::json;

    fn client(base_url: String) -> SupabaseClient {
        SupabaseClient::new(
            base_url,
            "test_key".to_string(),
            SupabaseTables {
                profiles: "user_profiles".to_string(),
                verification: "user_verifications".to_string(),
            },
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_in_list_quotes_ids() {
        assert_eq!(in_list(&["a".to_string(), "b,c".to_string()]), r#"("a","b,c")"#);
    }

    #[tokio::test]
    async fn test_get_profile_sends_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/user_profiles")
            .match_query(Query::AllOf(vec![
                Query::UrlEncoded("user_id".into(), "eq.u1".into()),
                Query::UrlEncoded("limit".into(), "1".into()),
            ]))
            .match_header("apikey", "test_key")
            .match_header("authorization", "Bearer test_key")
            .with_status(200)
            .with_body(json!([{ "user_id": "u1", "cleanliness_level": 7 }]).to_string())
            .create_async()
            .await;

        let profile = client(server.url()).get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.user_id(), Some("u1"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_profile_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_profiles")
            .match_query(Query::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        assert!(client(server.url()).get_profile("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_candidates_excludes_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/user_profiles")
            .match_query(Query::AllOf(vec![
                Query::UrlEncoded("user_type".into(), "eq.searcher".into()),
                Query::UrlEncoded("user_id".into(), r#"not.in.("a","b")"#.into()),
                Query::UrlEncoded("limit".into(), "50".into()),
            ]))
            .with_status(200)
            .with_body(json!([{ "user_id": "c" }, 42]).to_string())
            .create_async()
            .await;

        let filter = CandidateFilter::new(
            MatchingContext::SearcherMatching,
            vec!["b".to_string(), "a".to_string()],
            50,
        );
        let records = client(server.url()).query_candidates(&filter).await.unwrap();
        assert_eq!(records.len(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_profiles")
            .match_query(Query::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = client(server.url()).get_profile("u1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_verification_defaults_when_missing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_verifications")
            .match_query(Query::Any)
            .with_status(200)
            .with_body(json!([{ "email_verified": true, "phone_verified": false, "kyc_verified": false }]).to_string())
            .create_async()
            .await;

        let data = client(server.url()).verification("u1").await.unwrap();
        assert!(data.email_verified);
        assert!(!data.kyc_verified);
    }

    #[tokio::test]
    async fn test_verification_nullable_columns_read_as_unverified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_verifications")
            .match_query(Query::UrlEncoded("user_id".into(), "eq.u2".into()))
            .with_status(200)
            .with_body(json!([{ "email_verified": true, "phone_verified": null, "kyc_verified": null }]).to_string())
            .create_async()
            .await;

        let data = client(server.url()).verification("u2").await.unwrap();
        assert!(data.email_verified);
        assert!(!data.phone_verified);
        assert!(!data.kyc_verified);
    }
}
